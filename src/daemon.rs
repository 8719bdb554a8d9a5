//! Background mode and control of a running instance

use anyhow::{bail, Context, Result};
use nix::unistd::{fork, setsid, ForkResult};
use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::process::pid_file::read_pid_file;
use crate::process::{is_process_alive, send_sigterm};

/// How long `stop` waits for a signalled instance to exit
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

const STOP_POLL: Duration = Duration::from_millis(100);

/// Detach from the terminal.
///
/// Only the grandchild returns; the caller's process and the intermediate
/// child exit with status 0. Standard streams are pointed at `/dev/null`, so
/// logging must go to a file afterwards.
///
/// # Returns
/// `Ok` in the detached grandchild, an error if a fork or `setsid` failed
pub fn daemonize() -> Result<()> {
    // First fork - parent exits, child continues
    match unsafe { fork() }.context("First fork failed")? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid().context("setsid failed")?;

    // Second fork - the session leader exits so we never reacquire a terminal
    match unsafe { fork() }.context("Second fork failed")? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    redirect_stdio()
}

fn redirect_stdio() -> Result<()> {
    let devnull = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .context("Failed to open /dev/null")?;
    let fd = devnull.as_raw_fd();

    for target in 0..=2 {
        if unsafe { libc::dup2(fd, target) } < 0 {
            bail!("Failed to redirect fd {target}");
        }
    }
    Ok(())
}

/// Result of asking a running instance to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No PID file, or it names a process that is gone
    NotRunning,
    Stopped(u32),
    /// Signalled but still alive when the wait expired
    TimedOut(u32),
}

/// PID of the live instance recorded in `pid_file`, if any.
pub fn running_instance(pid_file: &Path) -> Option<u32> {
    read_pid_file(pid_file).filter(|pid| is_process_alive(*pid))
}

/// SIGTERM the instance recorded in `pid_file` and wait up to `timeout` for it
/// to exit.
///
/// The PID file is left for the instance to remove during its own teardown.
///
/// # Arguments
/// * `pid_file` - The supervisor's own PID file
/// * `timeout` - How long to wait after SIGTERM, normally [`STOP_TIMEOUT`]
pub fn stop_running(pid_file: &Path, timeout: Duration) -> Result<StopOutcome> {
    let Some(pid) = read_pid_file(pid_file) else {
        tracing::debug!("PID file not found: {}", pid_file.display());
        return Ok(StopOutcome::NotRunning);
    };
    if !is_process_alive(pid) {
        tracing::info!("Process not found: {pid}");
        return Ok(StopOutcome::NotRunning);
    }

    tracing::debug!("Kill process: {pid}");
    send_sigterm(pid).with_context(|| format!("Failed to signal process {pid}"))?;

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return Ok(StopOutcome::Stopped(pid));
        }
        thread::sleep(STOP_POLL);
    }

    tracing::warn!(
        "Process {pid} is still alive {}s after SIGTERM",
        timeout.as_secs()
    );
    Ok(StopOutcome::TimedOut(pid))
}
