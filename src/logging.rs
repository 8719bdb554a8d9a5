//! Tracing subscriber setup

use anyhow::{Context, Result};
use std::fs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;

/// Dependencies that are too chatty below warn
const QUIET_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util"];

/// Map a configured level name onto a tracing directive.
///
/// Accepts the usual names case-insensitively, plus `warning` and `critical`.
/// Anything unrecognised falls back to `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => "info",
    }
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    let mut directives = vec![level_directive(level).to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    EnvFilter::try_new(directives.join(",")).context("Invalid log filter")
}

/// Install the global subscriber: stderr plus a log file in `log_dir` that
/// rotates daily (`<log_filename>.YYYY-MM-DD`).
///
/// `level_override` comes from the command line and wins over the config.
/// Also creates `log_dir` and `pid_dir`.
pub fn init(global: &GlobalConfig, level_override: Option<&str>) -> Result<()> {
    fs::create_dir_all(&global.log_dir)
        .with_context(|| format!("Failed to create log dir: {}", global.log_dir.display()))?;
    fs::create_dir_all(&global.pid_dir)
        .with_context(|| format!("Failed to create pid dir: {}", global.pid_dir.display()))?;

    let file = rolling_file(global)?;

    let level = level_override.unwrap_or(&global.log_level);
    tracing_subscriber::registry()
        .with(build_filter(level)?)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!("Logging to {}.<date>", global.log_file().display());
    Ok(())
}

fn rolling_file(global: &GlobalConfig) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&global.log_filename)
        .build(&global.log_dir)
        .with_context(|| {
            format!(
                "Failed to open log file: {}",
                global.log_file().display()
            )
        })
}
