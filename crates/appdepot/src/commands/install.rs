//! Install command

use anyhow::{anyhow, Result};
use std::path::Path;

use super::Depot;
use crate::cli::InstallArgs;
use crate::output;

pub async fn run(args: InstallArgs, config_path: Option<&Path>) -> Result<()> {
    let depot = Depot::open(config_path)?;

    let record = depot
        .registry
        .product(&args.package)
        .ok_or_else(|| anyhow!("no product named '{}' in the catalog", args.package))?;

    if record.is_installed() && record.installed_version >= record.revision {
        output::info(&format!(
            "{} v{} is already installed",
            record.simple_name, record.installed_version
        ));
        return Ok(());
    }

    let reason = record.incompatibility_reason(&*depot.host);
    if !record.is_compatible(&*depot.host) {
        return Err(anyhow!("{}: {}", record.simple_name, reason));
    }
    if !reason.is_empty() {
        output::warning(&reason);
    }

    depot.registry.install(&record).await?;
    depot.registry.notify_installed(&record.package_name);
    depot.save_host_state()?;

    output::success(&format!("Installed {}", record.simple_name));
    Ok(())
}
