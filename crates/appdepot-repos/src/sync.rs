//! Catalog synchronization
//!
//! Rebuilds every provider in registration order, mapping each provider's
//! local 0..=100 progress into its slice of the overall bar so the
//! reported percentage never runs backwards. Cancellation is checked
//! between providers; an in-flight rebuild finishes but its result is not
//! acted on.

use crate::provider::ProductProvider;
use appdepot_core::{PackageHost, ProgressFn, ProgressUpdate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Cooperative cancellation handle for a running sync
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a sync pass accomplished
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Providers whose rebuild produced a repository
    pub rebuilt: Vec<&'static str>,
    /// Providers visited
    pub providers: usize,
    /// Packages installed at a revision behind what the catalog offers
    pub stale: Vec<String>,
    /// Previously loaded plugins now incompatible with the host
    pub incompatible: Vec<String>,
    /// Providers whose rebuild stopped at an authentication challenge;
    /// the sync should be retried once credentials are entered
    pub credentials_needed: Vec<&'static str>,
    pub cancelled: bool,
}

/// Rebuild `providers` sequentially, reporting bounded overall progress
pub async fn run_sync(
    providers: &[Arc<dyn ProductProvider>],
    host: &dyn PackageHost,
    cancel: &CancelToken,
    progress: &ProgressFn<'_>,
) -> SyncOutcome {
    let total = providers.len().max(1);
    let mut outcome = SyncOutcome {
        providers: providers.len(),
        ..Default::default()
    };

    for (i, provider) in providers.iter().enumerate() {
        if cancel.is_cancelled() {
            info!("Sync cancelled before {}", provider.name());
            outcome.cancelled = true;
            return outcome;
        }

        debug!("Rebuilding {} catalog", provider.name());
        let base = i * 100 / total;
        let name = provider.name();
        let scoped = move |update: ProgressUpdate| {
            let overall = base + (update.percent as usize) / total;
            progress(ProgressUpdate::new(
                overall.min(99) as u8,
                format!("{}: {}", name, update.message),
            ));
        };

        match provider.rebuild(&scoped).await {
            Some(repo) => {
                outcome.rebuilt.push(provider.name());
                for record in repo.stale_products(host) {
                    outcome.stale.push(record.package_name.clone());
                }
            }
            None => debug!("{} produced no catalog", provider.name()),
        }

        if provider.needs_credentials() {
            outcome.credentials_needed.push(provider.name());
        }
    }

    outcome.stale.sort();
    outcome.stale.dedup();
    outcome.incompatible = host.loaded_incompatible_plugins();

    progress(ProgressUpdate::new(99, "Finishing sync..."));
    progress(ProgressUpdate::new(100, "Sync complete"));
    outcome
}
