//! Starting and observing external commands
//!
//! Streamers and capturers are started fire-and-forget through the host
//! shell. They are only ever polled for liveness; the supervisor never waits
//! on them. The reset command is the one synchronous exception.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

use super::pid_file::write_pid_file;
use super::terminate_tracked;

/// Handle to a process started by a [`ProcessRunner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pub pid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Exit code is None when the process was killed by a signal or is unknown
    Exited(Option<i32>),
}

/// Starts, observes and stops the external processes of a camera pipeline.
pub trait ProcessRunner {
    /// Start `command` in the background and record its PID in `pid_file`.
    ///
    /// If the PID cannot be recorded the process is killed again and the
    /// write error returned.
    ///
    /// # Arguments
    /// * `command` - Shell command line, already templated
    /// * `pid_file` - Coordination file for the role being started
    fn spawn(&mut self, command: &str, pid_file: &Path) -> Result<ProcessHandle>;

    /// Non-blocking status check.
    fn status(&mut self, handle: &ProcessHandle) -> ProcessStatus;

    fn is_alive(&mut self, handle: &ProcessHandle) -> bool {
        self.status(handle) == ProcessStatus::Running
    }

    /// SIGTERM whatever `pid_file` names and remove the file.
    ///
    /// Returns the signalled PID, or None when nothing live was tracked.
    fn terminate(&mut self, pid_file: &Path) -> Option<u32>;

    /// Run `command` to completion and return its exit code.
    fn run_to_completion(&mut self, command: &str) -> Result<Option<i32>>;
}

/// [`ProcessRunner`] executing commands with `sh -c`.
pub struct ShellRunner {
    children: HashMap<u32, Child>,
    completion_timeout: Duration,
}

impl ShellRunner {
    /// `completion_timeout` bounds [`ProcessRunner::run_to_completion`].
    pub fn new(completion_timeout: Duration) -> Self {
        Self {
            children: HashMap::new(),
            completion_timeout,
        }
    }

    fn shell(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).stdin(Stdio::null());
        cmd
    }

    /// Reap children that have exited so they don't linger as zombies.
    fn reap_exited(&mut self) {
        self.children
            .retain(|_, child| matches!(child.try_wait(), Ok(None)));
    }
}

impl ProcessRunner for ShellRunner {
    fn spawn(&mut self, command: &str, pid_file: &Path) -> Result<ProcessHandle> {
        self.reap_exited();

        tracing::debug!("Running:\n{command}");
        let mut child = Self::shell(command)
            .spawn()
            .with_context(|| format!("Failed to spawn: {command}"))?;
        let pid = child.id();
        tracing::debug!("Started PID: {pid}");

        // A process without its coordination file can never be stopped
        if let Err(e) = write_pid_file(pid_file, pid) {
            tracing::warn!("Killing PID {pid}: {e:#}");
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
        self.children.insert(pid, child);

        Ok(ProcessHandle { pid })
    }

    fn status(&mut self, handle: &ProcessHandle) -> ProcessStatus {
        let Some(child) = self.children.get_mut(&handle.pid) else {
            // Already reaped
            return ProcessStatus::Exited(None);
        };

        match child.try_wait() {
            Ok(None) => ProcessStatus::Running,
            Ok(Some(status)) => ProcessStatus::Exited(status.code()),
            Err(e) => {
                tracing::warn!("Failed to poll process {}: {e}", handle.pid);
                ProcessStatus::Exited(None)
            }
        }
    }

    fn terminate(&mut self, pid_file: &Path) -> Option<u32> {
        terminate_tracked(pid_file)
    }

    fn run_to_completion(&mut self, command: &str) -> Result<Option<i32>> {
        tracing::debug!("Running and waiting:\n{command}");
        let mut child = Self::shell(command)
            .spawn()
            .with_context(|| format!("Failed to spawn: {command}"))?;

        match child
            .wait_timeout(self.completion_timeout)
            .context("Failed to wait for command")?
        {
            Some(status) => Ok(status.code()),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                bail!(
                    "Command did not finish within {}s and was killed: {command}",
                    self.completion_timeout.as_secs()
                )
            }
        }
    }
}
