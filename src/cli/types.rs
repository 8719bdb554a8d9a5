use clap::{Parser, Subcommand};
use std::path::PathBuf;

use camwatch::config::{DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "camwatch")]
#[command(about = "Supervise camera streamer and capturer pipelines", long_about = None)]
#[command(version)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    /// Directory holding the global and per-camera config files
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Global config file name inside the config directory
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,

    /// Override the configured log level
    #[arg(
        long,
        global = true,
        ignore_case = true,
        value_parser = ["debug", "info", "warning", "error", "critical"]
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Supervise cameras in the foreground
    Run,

    /// Supervise cameras in the background
    Start,

    /// Stop the background supervisor
    Stop,

    /// Stop then start the background supervisor
    Restart,

    /// Show supervisor and camera process state
    Status,

    /// Run one retention pass over the capture directory now
    Clean,
}
