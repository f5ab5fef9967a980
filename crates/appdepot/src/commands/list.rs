//! List command

use anyhow::Result;
use appdepot_core::ProductRecord;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::Depot;
use crate::cli::ListArgs;
use crate::output;

#[derive(Tabled)]
struct ProductRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    product_type: String,
    #[tabled(rename = "Revision")]
    revision: i32,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub async fn run(args: ListArgs, config_path: Option<&Path>) -> Result<()> {
    let depot = Depot::open(config_path)?;

    let mut products = match args.search.as_deref() {
        Some(terms) => depot.registry.search(terms),
        None => depot.registry.all_products(),
    };

    if args.stale {
        let stale = depot.registry.stale_packages();
        products.retain(|p| stale.contains(&p.package_name));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        output::info("No products in the catalog. Run 'appdepot sync' first.");
        return Ok(());
    }

    let rows: Vec<ProductRow> = products
        .iter()
        .map(|p| ProductRow {
            package: p.package_name.clone(),
            name: p.simple_name.clone(),
            product_type: p.product_type.to_string(),
            revision: p.revision,
            installed: if p.is_installed() {
                format!("v{}", p.installed_version)
            } else {
                "-".to_string()
            },
            status: status_of(p, &depot),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(())
}

fn status_of(record: &ProductRecord, depot: &Depot) -> String {
    let reason = record.incompatibility_reason(&*depot.host);
    if !record.is_compatible(&*depot.host) {
        return reason;
    }
    if record.is_installed() && record.installed_version < record.revision {
        return "update available".to_string();
    }
    if reason.is_empty() {
        "ok".to_string()
    } else {
        reason
    }
}
