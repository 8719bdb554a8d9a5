//! Camera supervision
//!
//! One lifecycle state machine per camera:
//!
//! ```text
//! Idle -> Starting -> AwaitingReady -> CaptureActive
//!            ^             |    ^           |
//!            +-- timeout --+    +-- capturer died
//!            +---------- streamer died -----+
//! ```
//!
//! Every tick advances each camera once, sequentially, in configuration
//! order. External processes are only polled, never waited on.

mod camera;
mod state;

pub use camera::Camera;
pub use state::{CameraEvent, CameraPhase, CameraState, Role};

use std::time::{Duration, Instant};

use crate::config::CameraConfig;
use crate::error::SupervisorError;
use crate::probe::ReadinessProber;
use crate::process::ProcessRunner;
use camera::Env;

pub struct CameraSupervisor {
    cameras: Vec<Camera>,
    runner: Box<dyn ProcessRunner>,
    prober: Box<dyn ReadinessProber>,
    probe_timeout: Duration,
}

impl CameraSupervisor {
    pub fn new(
        configs: Vec<CameraConfig>,
        runner: Box<dyn ProcessRunner>,
        prober: Box<dyn ReadinessProber>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            cameras: configs.into_iter().map(Camera::new).collect(),
            runner,
            prober,
            probe_timeout,
        }
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    /// Advance every camera once.
    ///
    /// Events are tagged with the camera's index. A fatal error from one camera
    /// stops the tick and is returned to the caller.
    pub fn tick(&mut self, now: Instant) -> Result<Vec<(usize, CameraEvent)>, SupervisorError> {
        let mut env = Env {
            runner: self.runner.as_mut(),
            prober: self.prober.as_ref(),
            probe_timeout: self.probe_timeout,
        };

        let mut events = Vec::new();
        for (index, camera) in self.cameras.iter_mut().enumerate() {
            let camera_events = camera.advance(&mut env, now)?;
            events.extend(camera_events.into_iter().map(|e| (index, e)));
        }
        Ok(events)
    }

    /// Terminate every camera's capturer then streamer.
    ///
    /// Safe to call repeatedly and for cameras that never started: missing or
    /// stale coordination files are skipped.
    pub fn stop_all(&mut self, reset: bool) -> Vec<(usize, CameraEvent)> {
        let mut events = Vec::new();
        for (index, camera) in self.cameras.iter_mut().enumerate() {
            let mut camera_events = Vec::new();
            camera.stop(self.runner.as_mut(), reset, &mut camera_events);
            events.extend(camera_events.into_iter().map(|e| (index, e)));
        }
        events
    }
}
