//! Fatal error taxonomy
//!
//! Everything that can go wrong for a single camera on a single tick is logged
//! and retried. The variants here are the conditions that stop the whole
//! supervisor with a non-zero exit status.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Neither the camera file nor the global `[camera]` table provides a value
    #[error("camera '{camera}': no {key} configured (camera or global scope)")]
    MissingSetting { camera: String, key: &'static str },

    #[error("camera '{camera}': failed to create capture directory {}: {source}", path.display())]
    CaptureDir {
        camera: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("already running, PID: {0}")]
    AlreadyRunning(u32),

    /// A panic escaped from a tick
    #[error("unhandled fault during tick: {0}")]
    Fault(String),
}
