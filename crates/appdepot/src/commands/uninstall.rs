//! Uninstall command

use anyhow::{anyhow, Result};
use std::path::Path;

use appdepot_core::PackageHost;

use super::Depot;
use crate::cli::UninstallArgs;
use crate::output;

pub async fn run(args: UninstallArgs, config_path: Option<&Path>) -> Result<()> {
    let depot = Depot::open(config_path)?;

    let record = depot
        .registry
        .product(&args.package)
        .ok_or_else(|| anyhow!("no product named '{}' in the catalog", args.package))?;

    if !record.is_installed() && !depot.host.is_installed(&record.package_name) {
        output::info(&format!("{} is not installed", record.simple_name));
        return Ok(());
    }

    depot.registry.uninstall(&record).await?;
    depot.registry.notify_uninstalled(&record.package_name);
    depot.save_host_state()?;

    output::success(&format!("Uninstalled {}", record.simple_name));
    Ok(())
}
