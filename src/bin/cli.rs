//! quickkv CLI binary
//!
//! Runs one command against the store described by the configuration

use clap::Parser;
use quickkv::cli::{self, Cli};
use quickkv::logging::LoggingSystem;
use quickkv::{Config, Store};
use tracing::error;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("Command failed: {}", e);
        eprintln!("(error) {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> quickkv::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    if let Some(kind) = cli.backend {
        config.backend.kind = kind;
        config.validate()?;
    }
    if !cli.verbose {
        // Less verbose for CLI
        config.logging.level = "warn".to_string();
    }
    LoggingSystem::new(config.logging.clone()).initialize()?;

    let store = Store::from_config(&config)?;
    let output = cli::execute(&store, cli.command)?;
    println!("{output}");
    Ok(())
}
