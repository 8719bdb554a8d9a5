//! Run command - supervise cameras in the foreground or as a daemon

use anyhow::Result;
use colored::Colorize;

use super::ConfigSource;
use crate::config::Settings;
use crate::daemon;
use crate::logging;
use crate::orchestrator::{IntervalScheduler, Orchestrator, OrchestratorConfig};
use crate::probe::HttpProber;
use crate::process::ShellRunner;
use crate::retention::RetentionManager;
use crate::supervisor::CameraSupervisor;

/// Supervise in the foreground until interrupted.
pub fn execute(source: &ConfigSource, log_level: Option<&str>) -> Result<()> {
    supervise(source, log_level, false)
}

/// Detach and supervise in the background.
///
/// Configuration is loaded before detaching so errors still reach the terminal.
pub fn execute_background(source: &ConfigSource, log_level: Option<&str>) -> Result<()> {
    supervise(source, log_level, true)
}

fn supervise(source: &ConfigSource, log_level: Option<&str>, background: bool) -> Result<()> {
    let Settings { global, cameras } = Settings::load(&source.dir, &source.file)?;

    if background {
        println!(
            "{} Starting camwatch in background, logging under {}",
            "→".cyan().bold(),
            global.log_dir.display()
        );
        daemon::daemonize()?;
    }
    logging::init(&global, log_level)?;

    if cameras.is_empty() {
        tracing::error!("Active cameras configs not found");
        return Ok(());
    }

    let cams_number = cameras.len();
    let config = OrchestratorConfig::from_global(&global, cams_number)?;
    let supervisor = CameraSupervisor::new(
        cameras,
        Box::new(ShellRunner::new(global.reset_timeout())),
        Box::new(HttpProber::new()?),
        global.probe_timeout(),
    );
    let scheduler = IntervalScheduler::new(global.retention.run_every());
    let mut orchestrator = Orchestrator::new(
        config,
        supervisor,
        RetentionManager::new(),
        Box::new(scheduler),
    );
    orchestrator.install_signal_handler()?;

    tracing::info!("Supervising {cams_number} camera(s)");
    orchestrator.run()
}
