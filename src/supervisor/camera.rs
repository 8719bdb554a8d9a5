//! Lifecycle state machine for a single camera

use std::fs;
use std::time::{Duration, Instant};

use super::state::{CameraEvent, CameraPhase, CameraState, Role};
use crate::config::{CameraConfig, CaptureCommand};
use crate::error::SupervisorError;
use crate::probe::{Readiness, ReadinessProber};
use crate::process::{ProcessRunner, ProcessStatus};

/// One camera pipeline: immutable config plus the state the supervisor mutates.
#[derive(Debug, Clone)]
pub struct Camera {
    pub config: CameraConfig,
    pub state: CameraState,
}

/// Collaborators a camera needs while advancing.
pub(super) struct Env<'a> {
    pub runner: &'a mut dyn ProcessRunner,
    pub prober: &'a dyn ReadinessProber,
    pub probe_timeout: Duration,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            state: CameraState::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn phase(&self) -> CameraPhase {
        self.state.phase
    }

    /// Advance the state machine by one tick.
    ///
    /// Only configuration-fatal conditions are returned as errors; everything
    /// else is logged, reported as an event and retried on later ticks.
    pub(super) fn advance(
        &mut self,
        env: &mut Env<'_>,
        now: Instant,
    ) -> Result<Vec<CameraEvent>, SupervisorError> {
        let mut events = Vec::new();

        if self.state.phase == CameraPhase::Idle {
            self.prepare_capture_dir()?;
            self.state.phase = CameraPhase::Starting;
        } else {
            self.check_streamer(env, &mut events);
        }

        if self.state.capturer_check {
            self.check_capturer(env, &mut events);
        }

        if self.state.phase == CameraPhase::Starting {
            self.start_streamer(env, now, &mut events);
        }

        if self.state.phase == CameraPhase::AwaitingReady {
            self.poll_readiness(env, now, &mut events);
        }

        if self.state.phase == CameraPhase::CaptureActive && self.state.capture_pending {
            self.start_capturer(env, &mut events);
        }

        Ok(events)
    }

    /// Kill capturer then streamer via their coordination files, optionally
    /// running the reset command afterwards.
    pub(super) fn stop(
        &mut self,
        runner: &mut dyn ProcessRunner,
        reset: bool,
        events: &mut Vec<CameraEvent>,
    ) {
        tracing::info!("Stop cam: {}", self.name());

        tracing::debug!("Kill {} capturer", self.name());
        runner.terminate(&self.config.capturer_pid_file);
        self.state.capturer = None;
        self.state.capturer_check = false;
        self.state.capture_pending = false;

        tracing::debug!("Kill {} streamer", self.name());
        runner.terminate(&self.config.streamer_pid_file);
        self.state.streamer = None;
        self.state.streamer_started_at = None;

        if reset {
            self.reset(runner, events);
        }
    }

    fn reset(&self, runner: &mut dyn ProcessRunner, events: &mut Vec<CameraEvent>) {
        let Some(cmd) = &self.config.reset_cmd else {
            tracing::debug!("Cam reset command not found. Skip reset");
            return;
        };

        tracing::info!("Resetting cam: {}", self.name());
        tracing::debug!("Reset command: {cmd}");
        let exit_code = match runner.run_to_completion(cmd) {
            Ok(Some(0)) => {
                tracing::info!("Reset with exit code: 0");
                Some(0)
            }
            Ok(code) => {
                tracing::warn!("Reset of {} exited with code: {code:?}", self.name());
                code
            }
            Err(e) => {
                tracing::warn!("Reset of {} failed: {e:#}", self.name());
                None
            }
        };
        events.push(CameraEvent::Reset { exit_code });
    }

    fn prepare_capture_dir(&self) -> Result<(), SupervisorError> {
        if self.config.capture == CaptureCommand::Disabled {
            return Ok(());
        }
        let dir = &self.config.capture_dir;
        if dir.exists() {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|source| {
            tracing::error!("Failed to create directory: {}", dir.display());
            SupervisorError::CaptureDir {
                camera: self.config.name.clone(),
                path: dir.clone(),
                source,
            }
        })
    }

    fn check_streamer(&mut self, env: &mut Env<'_>, events: &mut Vec<CameraEvent>) {
        let Some(handle) = self.state.streamer else {
            return;
        };
        match env.runner.status(&handle) {
            ProcessStatus::Running => {
                tracing::debug!("Streamer \"{}\" is alive", self.name());
            }
            ProcessStatus::Exited(code) => {
                tracing::warn!(
                    "Streamer \"{}\" is dead (exit code: {code:?})",
                    self.name()
                );
                self.state.streamer = None;
                self.state.streamer_started_at = None;
                self.state.phase = CameraPhase::Starting;
                events.push(CameraEvent::Exited {
                    role: Role::Streamer,
                    code,
                });
            }
        }
    }

    fn check_capturer(&mut self, env: &mut Env<'_>, events: &mut Vec<CameraEvent>) {
        let Some(handle) = self.state.capturer else {
            self.state.capturer_check = false;
            return;
        };
        match env.runner.status(&handle) {
            ProcessStatus::Running => {
                tracing::debug!("Capturer \"{}\" is alive", self.name());
            }
            ProcessStatus::Exited(code) => {
                tracing::warn!(
                    "Capturer \"{}\" is dead (exit code: {code:?})",
                    self.name()
                );
                self.state.capturer = None;
                self.state.capturer_check = false;
                // The streamer is left running; a fresh ready probe respawns the capturer
                if self.state.phase == CameraPhase::CaptureActive {
                    self.state.phase = CameraPhase::AwaitingReady;
                }
                events.push(CameraEvent::Exited {
                    role: Role::Capturer,
                    code,
                });
            }
        }
    }

    fn start_streamer(&mut self, env: &mut Env<'_>, now: Instant, events: &mut Vec<CameraEvent>) {
        tracing::info!("Run \"{}\" streamer in background", self.name());
        match env
            .runner
            .spawn(&self.config.streamer_cmd, &self.config.streamer_pid_file)
        {
            Ok(handle) => {
                self.state.streamer = Some(handle);
                self.state.streamer_started_at = Some(now);
                self.state.phase = CameraPhase::AwaitingReady;
                events.push(CameraEvent::Started {
                    role: Role::Streamer,
                    pid: handle.pid,
                });
            }
            Err(e) => {
                tracing::error!("Failed to start \"{}\" streamer: {e:#}", self.name());
                events.push(CameraEvent::SpawnFailed {
                    role: Role::Streamer,
                    error: format!("{e:#}"),
                });
            }
        }
    }

    fn poll_readiness(&mut self, env: &mut Env<'_>, now: Instant, events: &mut Vec<CameraEvent>) {
        let readiness = env.prober.probe(&self.config.ready_url, env.probe_timeout);
        events.push(CameraEvent::Probed(readiness));

        match readiness {
            Readiness::Ready => {
                tracing::info!("Checked \"{}\", status: 200", self.name());
                self.state.phase = CameraPhase::CaptureActive;
                self.state.capture_pending = true;
                return;
            }
            Readiness::NotReady(status) => {
                tracing::info!("Checked \"{}\", status: {status}", self.name());
            }
            Readiness::Unreachable => {}
        }

        let started_at = self.state.streamer_started_at.unwrap_or(now);
        let elapsed = now.saturating_duration_since(started_at);
        let max_start = self.config.max_start;

        if elapsed > max_start {
            tracing::warn!("Timed out waiting data from: {}", self.name());
            events.push(CameraEvent::StartTimedOut { elapsed });
            tracing::info!("Kill: {}", self.name());
            self.stop(&mut *env.runner, true, events);
            self.state.phase = CameraPhase::Starting;
        } else {
            tracing::info!(
                "Attempt \"{}\": [{}/{}]",
                self.name(),
                elapsed.as_secs(),
                max_start.as_secs()
            );
        }
    }

    fn start_capturer(&mut self, env: &mut Env<'_>, events: &mut Vec<CameraEvent>) {
        self.state.capture_pending = false;

        if let Some(handle) = self.state.capturer {
            if env.runner.is_alive(&handle) {
                tracing::warn!("Capturer \"{}\" is STILL alive", self.name());
                events.push(CameraEvent::CapturerStillAlive);
                return;
            }
        }

        let cmd = match &self.config.capture {
            CaptureCommand::Run(cmd) => cmd,
            CaptureCommand::Disabled => {
                tracing::info!("Capturer \"{}\" is turned off", self.name());
                events.push(CameraEvent::CaptureDisabled);
                return;
            }
        };

        tracing::info!("Run \"{}\" capturer in background", self.name());
        match env.runner.spawn(cmd, &self.config.capturer_pid_file) {
            Ok(handle) => {
                self.state.capturer = Some(handle);
                self.state.capturer_check = true;
                events.push(CameraEvent::Started {
                    role: Role::Capturer,
                    pid: handle.pid,
                });
            }
            Err(e) => {
                tracing::error!("Failed to start \"{}\" capturer: {e:#}", self.name());
                // Retry through another readiness cycle
                self.state.phase = CameraPhase::AwaitingReady;
                events.push(CameraEvent::SpawnFailed {
                    role: Role::Capturer,
                    error: format!("{e:#}"),
                });
            }
        }
    }
}
