use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use cacher::{
    app::load_config,
    cli::{handle_command, Cli, Commands},
    utils::{effective_level, init_logger},
};

fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; `config --init` may be pointed at a file that doesn't exist yet
    let explicit = match cli.command {
        Commands::Config { init: true } => None,
        _ => cli.config.as_deref(),
    };
    let config = load_config(explicit)?;

    // Set up logging (RUST_LOG still wins)
    init_logger(&effective_level(cli.verbose, &config.logging.level));

    tracing::debug!("Using configuration: {:?}", config);

    // Exit with appropriate code
    if handle_command(&cli, &config)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
