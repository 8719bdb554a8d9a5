pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod retention;
pub mod supervisor;
