//! CLI argument parsing with clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Appdepot - aggregate, sync and install products from bundled, local and
/// remote repositories
#[derive(Parser, Debug)]
#[command(name = "appdepot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to depot.json config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the aggregated product catalog
    List(ListArgs),

    /// Show one product in detail
    Show(ShowArgs),

    /// Synchronize every repository
    Sync(SyncArgs),

    /// Install a product
    Install(InstallArgs),

    /// Uninstall a product
    Uninstall(UninstallArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter products by a search term
    #[arg(long)]
    pub search: Option<String>,

    /// Only products with an update available
    #[arg(long)]
    pub stale: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Package name
    pub package: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only sync when the startup policy calls for it
    #[arg(long)]
    pub startup: bool,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Package name
    pub package: String,
}

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Package name
    pub package: String,
}
