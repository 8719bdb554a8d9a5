//! Stop command - signal the running supervisor and wait for it to exit

use anyhow::Result;
use colored::Colorize;

use super::ConfigSource;
use crate::config::load_global;
use crate::daemon::{self, StopOutcome, STOP_TIMEOUT};

pub fn execute(source: &ConfigSource) -> Result<()> {
    let global = load_global(&source.dir, &source.file)?;
    let pid_file = global.pid_file();

    if daemon::running_instance(&pid_file).is_none() {
        println!("{} camwatch is not running", "─".dimmed());
        return Ok(());
    }

    println!("{} Stopping camwatch...", "→".cyan().bold());
    match daemon::stop_running(&pid_file, STOP_TIMEOUT)? {
        StopOutcome::NotRunning => println!("{} camwatch is not running", "─".dimmed()),
        StopOutcome::Stopped(pid) => {
            println!("{} camwatch stopped (PID {pid})", "✓".green().bold())
        }
        StopOutcome::TimedOut(pid) => println!(
            "{} camwatch (PID {pid}) is still running {}s after SIGTERM",
            "!".yellow().bold(),
            STOP_TIMEOUT.as_secs()
        ),
    }
    Ok(())
}
