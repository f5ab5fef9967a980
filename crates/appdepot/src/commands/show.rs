//! Show command

use anyhow::{anyhow, Result};
use std::path::Path;

use super::Depot;
use crate::cli::ShowArgs;
use crate::output;

pub async fn run(args: ShowArgs, config_path: Option<&Path>) -> Result<()> {
    let depot = Depot::open(config_path)?;

    let record = depot
        .registry
        .product(&args.package)
        .ok_or_else(|| anyhow!("no product named '{}' in the catalog", args.package))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    output::header(&record.simple_name);
    output::kv("Package", &record.package_name);
    output::kv("Type", &record.product_type.to_string());
    output::kv("Version", record.version.as_deref().unwrap_or("-"));
    output::kv("Revision", &record.revision.to_string());
    if let Some(description) = &record.description {
        output::kv("Description", description);
    }
    if let Some(uri) = &record.app_uri {
        output::kv("Artifact", uri);
    }
    if let Some(hash) = &record.hash {
        output::kv("SHA-256", hash);
    }
    if record.has_file_size() {
        output::kv("Size", &format!("{} bytes", record.file_size));
    }
    output::kv(
        "Installed",
        &if record.is_installed() {
            format!("v{}", record.installed_version)
        } else {
            "no".to_string()
        },
    );

    let reason = record.incompatibility_reason(&*depot.host);
    if reason.is_empty() {
        output::success("Compatible with this host");
    } else if record.is_compatible(&*depot.host) {
        output::warning(&reason);
    } else {
        output::error(&reason);
    }
    Ok(())
}
