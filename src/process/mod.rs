//! Process utilities for camwatch
//!
//! Liveness checks and signal delivery by PID, coordination files, and the
//! [`ProcessRunner`] used by the camera supervisor to start external commands.

pub mod pid_file;
pub mod runner;

pub use runner::{ProcessHandle, ProcessRunner, ProcessStatus, ShellRunner};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::Path;

/// Check if a process with the given PID is alive
///
/// Uses `nix::sys::signal::kill` with signal `None` (null signal / signal 0) to check
/// process existence. This properly distinguishes between:
/// - Process exists and we can signal it (`Ok(())`)
/// - Process exists but we lack permission (`EPERM`)
/// - Process does not exist (`ESRCH`)
pub fn is_process_alive(pid: u32) -> bool {
    let Some(pid) = to_nix_pid(pid) else {
        return false;
    };

    match kill(pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(Errno::ESRCH) => false,
        Err(_) => false,
    }
}

/// Send SIGTERM to `pid`.
pub fn send_sigterm(pid: u32) -> nix::Result<()> {
    match to_nix_pid(pid) {
        Some(pid) => kill(pid, Signal::SIGTERM),
        None => Err(Errno::ESRCH),
    }
}

// PID 0 and anything above i32::MAX would address a process group or nothing.
fn to_nix_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(v) if v > 0 => Some(Pid::from_raw(v)),
        _ => None,
    }
}

/// Terminate the process named by a coordination file.
///
/// If the file names a live process it receives SIGTERM. The file is removed
/// whenever it exists, even when empty or stale.
///
/// # Arguments
/// * `pid_path` - Coordination file of a streamer, capturer or the supervisor
///
/// # Returns
/// The PID that was signalled, or None when nothing live was tracked
pub fn terminate_tracked(pid_path: &Path) -> Option<u32> {
    if !pid_path.exists() {
        tracing::debug!("Skip kill, PID file not found: {}", pid_path.display());
        return None;
    }

    let target = match pid_file::read_pid_file(pid_path) {
        Some(pid) if is_process_alive(pid) => {
            tracing::debug!("Kill process: {pid}");
            if let Err(e) = send_sigterm(pid) {
                tracing::warn!("Failed to kill process {pid}: {e}");
            }
            Some(pid)
        }
        Some(pid) => {
            tracing::info!("Process not found: {pid}");
            None
        }
        None => None,
    };

    pid_file::remove_pid_file(pid_path);
    target
}
