//! Coordination files
//!
//! A coordination file holds the textual PID of the process currently tracked
//! for one camera role (streamer or capturer), or of the supervisor itself.
//! Absent or empty means "not tracked".

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Write `pid` to `path`, replacing any previous content.
pub fn write_pid_file(path: &Path, pid: u32) -> Result<()> {
    fs::write(path, pid.to_string())
        .with_context(|| format!("Failed to write PID file: {}", path.display()))
}

/// Read the PID stored in `path`.
///
/// Returns None if the file doesn't exist, is empty or does not hold a number.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    tracing::debug!("PID file content: {:?}", content);
    let content = content.trim();
    if content.is_empty() {
        tracing::warn!("PID is empty: {}", path.display());
        return None;
    }
    content.parse().ok()
}

/// Remove the file at `path`, ignoring a missing file.
pub fn remove_pid_file(path: &Path) -> bool {
    fs::remove_file(path).is_ok()
}
