//! Single-instance guard backed by the main PID file

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::error::SupervisorError;
use crate::process::is_process_alive;
use crate::process::pid_file::{read_pid_file, remove_pid_file, write_pid_file};

/// The supervisor's own PID file, held for the lifetime of a run.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    released: bool,
}

impl InstanceLock {
    /// Record our PID in `path`.
    ///
    /// Fails with [`SupervisorError::AlreadyRunning`] when the file names another
    /// live process. A stale or empty file is overwritten.
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::acquire_as(path, std::process::id())
    }

    pub(crate) fn acquire_as(path: &Path, own_pid: u32) -> Result<Self> {
        if let Some(pid) = read_pid_file(path) {
            if pid != own_pid && is_process_alive(pid) {
                tracing::error!("Process with PID {pid} already exists");
                return Err(SupervisorError::AlreadyRunning(pid).into());
            }
            tracing::debug!("Overwriting stale PID file: {}", path.display());
        }
        write_pid_file(path, own_pid)?;
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Remove the PID file. Repeated calls are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if remove_pid_file(&self.path) {
            tracing::debug!("Removed PID file: {}", self.path.display());
        } else {
            tracing::warn!("PID file not found: {}", self.path.display());
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}
