//! Status command - show the supervisor and per-camera coordination files

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use super::ConfigSource;
use crate::config::Settings;
use crate::process::is_process_alive;
use crate::process::pid_file::read_pid_file;

/// What a coordination file says about its process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracked {
    /// No file, or an empty one
    Absent,
    /// Names a process that no longer exists
    Stale(u32),
    Running(u32),
}

impl Tracked {
    pub fn from_pid_file(path: &Path) -> Self {
        match read_pid_file(path) {
            None => Tracked::Absent,
            Some(pid) if is_process_alive(pid) => Tracked::Running(pid),
            Some(pid) => Tracked::Stale(pid),
        }
    }

    fn render(&self) -> String {
        match self {
            Tracked::Absent => "─ not running".dimmed().to_string(),
            Tracked::Stale(pid) => format!("{} stale PID {pid}", "✗".red()),
            Tracked::Running(pid) => format!("{} running (PID {pid})", "●".green()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraStatus {
    pub name: String,
    pub streamer: Tracked,
    pub capturer: Tracked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub supervisor: Tracked,
    pub cameras: Vec<CameraStatus>,
}

pub fn collect(settings: &Settings) -> StatusReport {
    StatusReport {
        supervisor: Tracked::from_pid_file(&settings.global.pid_file()),
        cameras: settings
            .cameras
            .iter()
            .map(|cam| CameraStatus {
                name: cam.name.clone(),
                streamer: Tracked::from_pid_file(&cam.streamer_pid_file),
                capturer: Tracked::from_pid_file(&cam.capturer_pid_file),
            })
            .collect(),
    }
}

pub fn execute(source: &ConfigSource) -> Result<()> {
    let settings = Settings::load(&source.dir, &source.file)?;
    let report = collect(&settings);

    println!("{} {}", "camwatch:".bold(), report.supervisor.render());
    if report.cameras.is_empty() {
        println!("\n{}", "No active cameras configured".dimmed());
        return Ok(());
    }

    let width = report
        .cameras
        .iter()
        .map(|cam| cam.name.len())
        .max()
        .unwrap_or(0);
    println!();
    for cam in &report.cameras {
        println!(
            "  {}  streamer {}  capturer {}",
            format!("{:width$}", cam.name).bold(),
            cam.streamer.render(),
            cam.capturer.render(),
        );
    }
    Ok(())
}
