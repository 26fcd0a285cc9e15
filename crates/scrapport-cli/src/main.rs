// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scrapport command-line entry point

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use config::Config;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config_file {
        Some(path) => Config::load(Some(path))
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(None)?,
    };
    if let Some(project) = &cli.project {
        config.scrapbox.project = Some(project.clone());
    }

    let ok = match &cli.command {
        Commands::Migrate(args) => commands::migrate(&config, args).await?,
        Commands::Export(args) => commands::export(&config, args).await?,
        Commands::RestoreLinks(args) => commands::restore_links(&config, args).await?,
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
