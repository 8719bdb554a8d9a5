//! Implementations of the command line subcommands

pub mod clean;
pub mod run;
pub mod status;
pub mod stop;

use std::path::PathBuf;

/// Where the configuration lives
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub dir: PathBuf,
    /// Global file name inside `dir`
    pub file: String,
}
