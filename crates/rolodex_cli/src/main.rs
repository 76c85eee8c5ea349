//! Command-line host for the Rolodex core.
//!
//! # Responsibility
//! - Resolve configuration, start logging and open the contact store.
//! - Turn fatal store errors into exit status 1.

use anyhow::Context;
use clap::Parser;
use rolodex_core::{init_logging, ContactService, PersistenceGateway, RolodexConfig};

mod cli;
mod commands;

fn main() {
    if let Err(error) = run() {
        eprintln!("rolodex error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let mut config = RolodexConfig::load().context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(dir) = cli.log_dir {
        config.log_dir = Some(dir);
    }
    init_logging(&config.log_level, config.log_target()).context("failed to start logging")?;

    let mut gateway = PersistenceGateway::open(&config.database_path)?;
    let load = gateway.load_all();
    for failure in &load.failures {
        eprintln!("warning: could not load {:?}: {}", failure.scope, failure.error);
    }

    let mut service = ContactService::new(gateway);
    commands::handle(cli.command, &mut service)
}
