//! Quota-driven retention of captured files
//!
//! A retention pass checks the capture directory against a size budget and a
//! free-space floor. When either is violated it deletes files oldest first,
//! stopping once a fixed number of *counted* removals has been made. Files no
//! larger than the force-remove threshold are deleted without counting, so
//! partial or empty recordings never consume the per-pass budget.
//!
//! A pass is best-effort: it does not re-check the thresholds after deleting,
//! and may end still over budget when the cap was reached first. The next
//! scheduled pass continues from there.

pub mod scan;

pub use scan::StorageEntry;

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Limits for one retention pass. Zero disables a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionBudget {
    pub max_total_bytes: u64,
    pub min_free_bytes: u64,
    pub max_counted_removals: u64,
    /// Files of at most this size are removed without counting
    pub force_remove_below_bytes: u64,
}

/// What a pass measured and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Sum of file sizes, when the size limit is enabled
    pub used_bytes: Option<u64>,
    /// Available space, when the free-space limit is enabled
    pub free_bytes: Option<u64>,
    pub warranted: bool,
    /// Removed files in removal order
    pub removed: Vec<PathBuf>,
    pub counted_removals: u64,
    pub cap_reached: bool,
}

type FreeSpaceFn = Box<dyn Fn(&Path) -> Result<u64> + Send>;

pub struct RetentionManager {
    free_space: FreeSpaceFn,
}

impl Default for RetentionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RetentionManager {
    pub fn new() -> Self {
        Self {
            free_space: Box::new(scan::free_space),
        }
    }

    /// Use a custom free-space source instead of the filesystem.
    pub fn with_free_space<F>(free_space: F) -> Self
    where
        F: Fn(&Path) -> Result<u64> + Send + 'static,
    {
        Self {
            free_space: Box::new(free_space),
        }
    }

    /// Run one retention pass over `directory`.
    ///
    /// Per-file failures are logged and skipped; only a failed scan or a failed
    /// free-space query aborts the pass.
    ///
    /// # Arguments
    /// * `directory` - Capture root, scanned recursively
    /// * `budget` - Size quota, free-space floor and removal cap for this pass
    ///
    /// # Returns
    /// What was removed, and whether the pass stopped at the removal cap
    pub fn reclaim(&self, directory: &Path, budget: &RetentionBudget) -> Result<ReclaimReport> {
        tracing::debug!("Cleaner started: {}", directory.display());
        let mut report = ReclaimReport::default();
        let mut entries = None;

        if budget.max_total_bytes != 0 {
            let scanned = scan::scan_directory(directory)?;
            let used = scan::total_size(&scanned);
            tracing::debug!("Store files size, bytes: {used}");
            if used > budget.max_total_bytes {
                tracing::info!(
                    "Current store size / configured max store size, GB: {:.3}/{:.3}",
                    gb(used),
                    gb(budget.max_total_bytes)
                );
                report.warranted = true;
            }
            report.used_bytes = Some(used);
            entries = Some(scanned);
        }

        if budget.min_free_bytes != 0 {
            let free = (self.free_space)(directory)?;
            tracing::debug!("Store free space, bytes: {free}");
            if free < budget.min_free_bytes {
                tracing::info!(
                    "Current store free space / configured keep free space, GB: {:.3}/{:.3}",
                    gb(free),
                    gb(budget.min_free_bytes)
                );
                report.warranted = true;
            }
            report.free_bytes = Some(free);
        }

        if !report.warranted {
            tracing::debug!("Cleaner finished, nothing to do");
            return Ok(report);
        }

        tracing::info!("Clean is active");
        let mut entries = match entries {
            Some(entries) => entries,
            None => scan::scan_directory(directory)?,
        };
        scan::sort_oldest_first(&mut entries);

        for entry in &entries {
            // Re-stat: the file may have been removed or grown since the scan
            let size = match fs::metadata(&entry.path) {
                Ok(meta) if meta.is_file() => meta.len(),
                _ => continue,
            };

            tracing::info!("Remove file: {}", entry.path.display());
            if let Err(e) = fs::remove_file(&entry.path) {
                tracing::warn!("Failed to remove {}: {e}", entry.path.display());
                continue;
            }
            report.removed.push(entry.path.clone());

            if size > budget.force_remove_below_bytes {
                report.counted_removals += 1;
            } else {
                tracing::warn!(
                    "Removed \"{}\" file with the {size} bytes size",
                    entry.path.display()
                );
            }

            if budget.max_counted_removals != 0
                && report.counted_removals >= budget.max_counted_removals
            {
                tracing::debug!("Max removes reached: {}", budget.max_counted_removals);
                report.cap_reached = true;
                break;
            }
        }

        tracing::debug!("Cleaner finished");
        Ok(report)
    }
}

fn gb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0 / 1024.0
}
