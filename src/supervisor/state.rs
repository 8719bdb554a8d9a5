//! Per-camera runtime state and the events a tick can produce

use std::fmt;
use std::time::{Duration, Instant};

use crate::probe::Readiness;
use crate::process::ProcessHandle;

/// Lifecycle phase of one camera pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraPhase {
    /// Not observed yet
    #[default]
    Idle,
    /// Streamer must be (re)started
    Starting,
    /// Streamer running, polling its readiness endpoint
    AwaitingReady,
    /// Streamer confirmed ready; capturer started or disabled
    CaptureActive,
}

impl fmt::Display for CameraPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPhase::Idle => write!(f, "idle"),
            CameraPhase::Starting => write!(f, "starting"),
            CameraPhase::AwaitingReady => write!(f, "awaiting-ready"),
            CameraPhase::CaptureActive => write!(f, "capture-active"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Streamer,
    Capturer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Streamer => write!(f, "streamer"),
            Role::Capturer => write!(f, "capturer"),
        }
    }
}

/// Mutable state of one camera, owned by the supervisor.
///
/// At most one streamer handle and one capturer handle are tracked. A handle
/// is only replaced after its process was observed dead or explicitly killed.
#[derive(Debug, Clone, Default)]
pub struct CameraState {
    pub phase: CameraPhase,
    pub streamer: Option<ProcessHandle>,
    pub streamer_started_at: Option<Instant>,
    pub capturer: Option<ProcessHandle>,
    /// Capturer liveness is checked every tick while set
    pub capturer_check: bool,
    /// A ready probe was seen and the capturer has not been handled yet
    pub capture_pending: bool,
}

/// Something that happened to a camera during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    Started { role: Role, pid: u32 },
    Exited { role: Role, code: Option<i32> },
    SpawnFailed { role: Role, error: String },
    Probed(Readiness),
    StartTimedOut { elapsed: Duration },
    /// Reset command ran; None when it failed to run or was killed
    Reset { exit_code: Option<i32> },
    CapturerStillAlive,
    CaptureDisabled,
}
