//! Appdepot CLI - product catalog aggregation and installation
//!
//! This is the main entry point for the appdepot command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::List(args) => commands::list::run(args, cli.config.as_deref()).await,
        Commands::Show(args) => commands::show::run(args, cli.config.as_deref()).await,
        Commands::Sync(args) => commands::sync::run(args, cli.config.as_deref()).await,
        Commands::Install(args) => commands::install::run(args, cli.config.as_deref()).await,
        Commands::Uninstall(args) => commands::uninstall::run(args, cli.config.as_deref()).await,
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
