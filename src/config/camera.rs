//! Per-camera settings: the raw optional form read from TOML and the
//! fully-resolved form the supervisor runs on.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::template::Template;
use crate::error::SupervisorError;

/// `cap_cmd` accepts either a command string or `false` to turn the capturer off.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CaptureSetting {
    Command(String),
    Flag(bool),
}

/// Camera keys as they appear in a camera file or in the global `[camera]` table.
///
/// Every field is optional; [`CameraSettings::overlay`] merges a camera file
/// over the global defaults before resolution.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub name: Option<String>,
    pub active: Option<bool>,
    /// Streamer start command
    pub cmd: Option<String>,
    pub cap_cmd: Option<CaptureSetting>,
    pub reset_cmd: Option<String>,
    /// Readiness URL
    pub cap_url: Option<String>,
    /// Capture directory for this camera
    pub cap_dir_cam: Option<String>,
    pub max_start_seconds: Option<u64>,
    pub pid_streamer: Option<String>,
    pub pid_capturer: Option<String>,
}

impl CameraSettings {
    /// Camera-specific values win; anything unset falls back to `defaults`.
    pub fn overlay(self, defaults: &CameraSettings) -> CameraSettings {
        CameraSettings {
            name: self.name.or_else(|| defaults.name.clone()),
            active: self.active.or(defaults.active),
            cmd: self.cmd.or_else(|| defaults.cmd.clone()),
            cap_cmd: self.cap_cmd.or_else(|| defaults.cap_cmd.clone()),
            reset_cmd: self.reset_cmd.or_else(|| defaults.reset_cmd.clone()),
            cap_url: self.cap_url.or_else(|| defaults.cap_url.clone()),
            cap_dir_cam: self.cap_dir_cam.or_else(|| defaults.cap_dir_cam.clone()),
            max_start_seconds: self.max_start_seconds.or(defaults.max_start_seconds),
            pid_streamer: self.pid_streamer.or_else(|| defaults.pid_streamer.clone()),
            pid_capturer: self.pid_capturer.or_else(|| defaults.pid_capturer.clone()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }

    /// Resolve into a runtime config, substituting placeholders.
    ///
    /// `name` must already be set (the loader falls back to the file stem).
    pub fn resolve(
        &self,
        pid_dir: &Path,
        cams_number: usize,
    ) -> Result<CameraConfig, SupervisorError> {
        let name = self.name.clone().unwrap_or_default();
        let t = Template::new(&name, cams_number);

        let missing = |key: &'static str| SupervisorError::MissingSetting {
            camera: name.clone(),
            key,
        };

        let streamer_cmd = self.cmd.as_deref().ok_or_else(|| missing("cmd"))?;
        let capture = match &self.cap_cmd {
            Some(CaptureSetting::Command(cmd)) => CaptureCommand::Run(t.apply(cmd.trim())),
            Some(CaptureSetting::Flag(false)) => CaptureCommand::Disabled,
            // `true` names no command
            Some(CaptureSetting::Flag(true)) | None => return Err(missing("cap_cmd")),
        };
        let ready_url = self.cap_url.as_deref().ok_or_else(|| missing("cap_url"))?;
        let capture_dir = self
            .cap_dir_cam
            .as_deref()
            .ok_or_else(|| missing("cap_dir_cam"))?;
        let max_start_seconds = self
            .max_start_seconds
            .ok_or_else(|| missing("max_start_seconds"))?;
        let pid_streamer = self
            .pid_streamer
            .as_deref()
            .ok_or_else(|| missing("pid_streamer"))?;
        let pid_capturer = self
            .pid_capturer
            .as_deref()
            .ok_or_else(|| missing("pid_capturer"))?;

        Ok(CameraConfig {
            streamer_cmd: t.apply(streamer_cmd.trim()),
            capture,
            reset_cmd: self.reset_cmd.as_deref().map(|c| t.apply(c.trim())),
            ready_url: t.apply(ready_url),
            max_start: Duration::from_secs(max_start_seconds),
            capture_dir: PathBuf::from(t.apply(capture_dir)),
            streamer_pid_file: pid_dir.join(t.apply(pid_streamer)),
            capturer_pid_file: pid_dir.join(t.apply(pid_capturer)),
            name,
        })
    }
}

/// What to run once the streamer reports ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureCommand {
    Run(String),
    /// Configured as `cap_cmd = false`
    Disabled,
}

/// Immutable, fully-resolved configuration of one camera pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub name: String,
    pub streamer_cmd: String,
    pub capture: CaptureCommand,
    pub reset_cmd: Option<String>,
    pub ready_url: String,
    pub max_start: Duration,
    pub capture_dir: PathBuf,
    pub streamer_pid_file: PathBuf,
    pub capturer_pid_file: PathBuf,
}
