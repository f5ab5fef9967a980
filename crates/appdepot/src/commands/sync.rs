//! Sync command

use anyhow::Result;
use appdepot_repos::sync::CancelToken;
use appdepot_repos::StartupAction;
use std::path::Path;

use super::Depot;
use crate::cli::SyncArgs;
use crate::output;

pub async fn run(args: SyncArgs, config_path: Option<&Path>) -> Result<()> {
    let depot = Depot::open(config_path)?;
    let cancel = CancelToken::new();

    let bar = output::percent_bar("Synchronizing catalogs");
    let progress = {
        let bar = bar.clone();
        move |update: appdepot_core::ProgressUpdate| {
            bar.set_position(update.percent as u64);
            bar.set_message(update.message);
        }
    };

    let outcome = if args.startup {
        match depot.registry.startup(&cancel, &progress).await? {
            StartupAction::Synced(outcome) => Some(outcome),
            StartupAction::IncompatiblePlugins(plugins) => {
                bar.finish_and_clear();
                for plugin in plugins {
                    output::warning(&format!("{} is no longer compatible", plugin));
                }
                None
            }
            StartupAction::UpToDate => {
                bar.finish_and_clear();
                output::info("Catalog already up to date");
                None
            }
        }
    } else {
        Some(depot.registry.sync(&cancel, &progress).await?)
    };

    bar.finish_and_clear();
    let outcome = match outcome {
        Some(outcome) => outcome,
        None => return Ok(()),
    };

    if outcome.cancelled {
        output::warning("Sync cancelled");
        return Ok(());
    }

    output::success(&format!(
        "Synced {} of {} catalogs",
        outcome.rebuilt.len(),
        outcome.providers
    ));
    if !outcome.stale.is_empty() {
        output::info(&format!("Updates available: {}", outcome.stale.join(", ")));
    }
    for plugin in &outcome.incompatible {
        output::warning(&format!("{} is no longer compatible", plugin));
    }
    for provider in &outcome.credentials_needed {
        output::warning(&format!(
            "The {} repository requires credentials; configure them and sync again",
            provider
        ));
    }
    Ok(())
}
