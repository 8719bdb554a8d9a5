//! Directory scanning for the retention pass

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One file found by a scan. Only valid for the pass that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Recursively list regular files under `dir`.
///
/// Files that vanish or cannot be stat'ed while scanning are skipped.
pub fn scan_directory(dir: &Path) -> Result<Vec<StorageEntry>> {
    let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let paths = glob::glob(&pattern)
        .with_context(|| format!("Invalid scan pattern: {pattern}"))?;

    let mut entries = Vec::new();
    for path in paths {
        let path = match path {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!("Skipping unreadable path: {e}");
                continue;
            }
        };
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        entries.push(StorageEntry {
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: meta.len(),
            path,
        });
    }
    Ok(entries)
}

/// Oldest first; ties broken by path so the order is deterministic.
pub fn sort_oldest_first(entries: &mut [StorageEntry]) {
    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
}

pub fn total_size(entries: &[StorageEntry]) -> u64 {
    entries.iter().map(|e| e.size).sum()
}

/// Bytes available to unprivileged users on the filesystem holding `dir`.
pub fn free_space(dir: &Path) -> Result<u64> {
    fs2::available_space(dir)
        .with_context(|| format!("Failed to query free space: {}", dir.display()))
}
