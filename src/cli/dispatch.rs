use anyhow::Result;
use camwatch::commands::{clean, run, status, stop, ConfigSource};

use super::types::{Cli, Commands};

pub fn dispatch(cli: Cli) -> Result<()> {
    let source = ConfigSource {
        dir: cli.config_dir,
        file: cli.config_file,
    };
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Run => run::execute(&source, log_level),
        Commands::Start => run::execute_background(&source, log_level),
        Commands::Stop => stop::execute(&source),
        Commands::Restart => {
            stop::execute(&source)?;
            run::execute_background(&source, log_level)
        }
        Commands::Status => status::execute(&source),
        Commands::Clean => clean::execute(&source, log_level),
    }
}
