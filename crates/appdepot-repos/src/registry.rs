//! Provider registry
//!
//! The registry owns the ordered set of providers and is the single entry
//! point for catalog queries, install routing, host state reconciliation
//! and synchronization. Registration order is precedence order: when two
//! providers offer the same package, the earlier registration wins.

use crate::provider::ProductProvider;
use crate::sync::{run_sync, CancelToken, SyncOutcome};
use anyhow::Result;
use appdepot_core::{Error, PackageHost, ProductRecord, ProgressFn, SharedSettings};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Outbound user-facing notifications
pub trait Notifier: Send + Sync {
    /// Updates are available for these packages
    fn updates_available(&self, packages: &[String]);

    /// Any previous update notification is no longer accurate
    fn clear_updates(&self);

    /// One-shot user-visible message
    fn toast(&self, message: &str);
}

/// Notifier that only writes to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn updates_available(&self, packages: &[String]) {
        info!("Updates available for: {}", packages.join(", "));
    }

    fn clear_updates(&self) {
        debug!("Update notification cleared");
    }

    fn toast(&self, message: &str) {
        info!("{}", message);
    }
}

/// What the startup policy decided to do
#[derive(Debug)]
pub enum StartupAction {
    /// A sync ran; its outcome
    Synced(SyncOutcome),
    /// No sync needed, but previously loaded plugins are now incompatible
    IncompatiblePlugins(Vec<String>),
    /// Nothing to do
    UpToDate,
}

/// Drops the single-flight flag when a sync finishes, panics included
struct SyncGuard(Arc<AtomicBool>);

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ProviderRegistry {
    host: Arc<dyn PackageHost>,
    settings: SharedSettings,
    notifier: Arc<dyn Notifier>,
    providers: Mutex<Vec<Arc<dyn ProductProvider>>>,
    sync_running: Arc<AtomicBool>,
    /// Installs we asked the host for and are waiting to observe
    outstanding_installs: Mutex<HashSet<String>>,
}

impl ProviderRegistry {
    pub fn new(
        host: Arc<dyn PackageHost>,
        settings: SharedSettings,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            host,
            settings,
            notifier,
            providers: Mutex::new(Vec::new()),
            sync_running: Arc::new(AtomicBool::new(false)),
            outstanding_installs: Mutex::new(HashSet::new()),
        }
    }

    /// Append a provider. Order of registration is order of precedence.
    pub fn register(&self, provider: Arc<dyn ProductProvider>) {
        debug!("Registered {} provider", provider.name());
        self.providers.lock().unwrap().push(provider);
    }

    pub fn providers(&self) -> Vec<Arc<dyn ProductProvider>> {
        self.providers.lock().unwrap().clone()
    }

    /// The deduplicated catalog: every provider's products merged in
    /// registration order, first provider wins per package. An invalid
    /// record is skipped without taking the rest of its repository down.
    /// Sorted by package name.
    pub fn all_products(&self) -> Vec<ProductRecord> {
        let mut map: HashMap<String, ProductRecord> = HashMap::new();
        for provider in self.providers() {
            let repo = match provider.repository() {
                Some(repo) => repo,
                None => continue,
            };
            if repo.is_valid(&*self.host) {
                repo.merge_unique_into(&mut map);
                continue;
            }
            for record in repo.products() {
                if !record.is_valid(&*self.host) {
                    warn!(
                        "Skipping invalid record {} in {} catalog",
                        record.package_name,
                        provider.name()
                    );
                } else if !map.contains_key(&record.package_name) {
                    map.insert(record.package_name.clone(), record.clone());
                }
            }
        }

        let mut products: Vec<ProductRecord> = map.into_values().collect();
        products.sort_by(|a, b| a.package_name.cmp(&b.package_name));
        products
    }

    /// The winning record for a package, honoring provider precedence
    pub fn product(&self, package: &str) -> Option<ProductRecord> {
        for provider in self.providers() {
            if let Some(repo) = provider.repository() {
                if let Some(record) = repo.product(package) {
                    return Some(record.clone());
                }
            }
        }
        None
    }

    /// First registered provider whose catalog contains the package
    pub fn provider_for(&self, package: &str) -> Option<Arc<dyn ProductProvider>> {
        self.providers()
            .into_iter()
            .find(|p| p.contains(package))
    }

    /// Resolve the provider that should act on `record`. Preference order:
    /// the provider whose repository the record came from, when its copy is
    /// compatible; else the first provider holding a compatible copy; else
    /// the first provider holding the package at all.
    pub fn provider_for_product(
        &self,
        record: &ProductRecord,
    ) -> Option<Arc<dyn ProductProvider>> {
        let providers = self.providers();

        if let Some(repo_key) = record.repo_key.as_deref() {
            for provider in &providers {
                let repo = match provider.repository() {
                    Some(repo) => repo,
                    None => continue,
                };
                if repo.repo_key() == repo_key {
                    if let Some(own) = repo.product(&record.package_name) {
                        if own.is_compatible(&*self.host) {
                            return Some(provider.clone());
                        }
                    }
                }
            }
        }

        let mut first_containing = None;
        for provider in &providers {
            let repo = match provider.repository() {
                Some(repo) => repo,
                None => continue,
            };
            if let Some(own) = repo.product(&record.package_name) {
                if own.is_compatible(&*self.host) {
                    return Some(provider.clone());
                }
                if first_containing.is_none() {
                    first_containing = Some(provider.clone());
                }
            }
        }
        first_containing
    }

    /// Record that an install was handed to the host so the eventual
    /// install observation can be tied back to us
    pub fn mark_install_requested(&self, package: &str) {
        self.outstanding_installs
            .lock()
            .unwrap()
            .insert(package.to_string());
    }

    /// React to a package install observed on the host. Broadcast to all
    /// providers; any of them may hold a record for it.
    pub fn notify_installed(&self, package: &str) {
        let was_ours = self
            .outstanding_installs
            .lock()
            .unwrap()
            .remove(package);
        let providers = self.providers();
        // Decide before the broadcast: patching may create a record
        let known = providers.iter().any(|p| p.contains(package));
        let mut changed = false;
        for provider in &providers {
            changed |= provider.installed(package);
        }
        if !known {
            for provider in &providers {
                if provider.adopt_unknown(package) {
                    changed = true;
                    break;
                }
            }
        }
        debug!(
            "Install of {} observed (requested by us: {}, state changed: {})",
            package, was_ours, changed
        );
        if changed {
            self.check_for_available_updates();
        }
    }

    /// React to a package removal observed on the host
    pub fn notify_uninstalled(&self, package: &str) {
        self.outstanding_installs.lock().unwrap().remove(package);
        let mut changed = false;
        for provider in self.providers() {
            changed |= provider.uninstalled(package);
        }
        if changed {
            self.check_for_available_updates();
        }
    }

    /// Packages installed at a revision behind the winning catalog entry
    pub fn stale_packages(&self) -> Vec<String> {
        self.all_products()
            .iter()
            .filter(|record| {
                self.host
                    .installed_version(&record.package_name)
                    .map(|installed| installed < record.revision)
                    .unwrap_or(false)
            })
            .map(|record| record.package_name.clone())
            .collect()
    }

    pub fn has_available_updates(&self) -> bool {
        !self.stale_packages().is_empty()
    }

    /// Recompute staleness and keep the update notification accurate
    pub fn check_for_available_updates(&self) {
        let stale = self.stale_packages();
        if stale.is_empty() {
            self.notifier.clear_updates();
        } else {
            self.notifier.updates_available(&stale);
        }
    }

    pub fn search(&self, terms: &str) -> Vec<ProductRecord> {
        self.all_products()
            .into_iter()
            .filter(|p| p.matches(terms))
            .collect()
    }

    /// Route an install to the responsible provider
    pub async fn install(&self, record: &ProductRecord) -> Result<()> {
        if !record.is_valid(&*self.host) {
            let message = format!("Unable to install {}", record.simple_name);
            self.notifier.toast(&message);
            return Err(Error::invalid_product(record.package_name.clone()).into());
        }

        let provider = match self.provider_for_product(record) {
            Some(provider) => provider,
            None => {
                let message = format!("Unable to install {}", record.simple_name);
                self.notifier.toast(&message);
                return Err(Error::no_provider(record.package_name.clone()).into());
            }
        };

        info!(
            "Installing {} via {} provider",
            record.package_name,
            provider.name()
        );
        self.mark_install_requested(&record.package_name);
        provider.install(record).await
    }

    /// Route an uninstall to the responsible provider
    pub async fn uninstall(&self, record: &ProductRecord) -> Result<()> {
        let provider = match self.provider_for_product(record) {
            Some(provider) => provider,
            None => {
                let message = format!("Unable to uninstall {}", record.simple_name);
                self.notifier.toast(&message);
                return Err(Error::no_provider(record.package_name.clone()).into());
            }
        };

        info!(
            "Uninstalling {} via {} provider",
            record.package_name,
            provider.name()
        );
        provider.uninstall(record).await
    }

    /// Full catalog sync. At most one runs at a time; a second request
    /// while one is in flight is rejected, not queued.
    pub async fn sync(&self, cancel: &CancelToken, progress: &ProgressFn<'_>) -> Result<SyncOutcome> {
        if self
            .sync_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Sync already in progress, rejecting");
            return Err(Error::SyncInProgress.into());
        }
        let _guard = SyncGuard(self.sync_running.clone());

        let providers = self.providers();
        let outcome = run_sync(&providers, &*self.host, cancel, progress).await;

        if !outcome.cancelled {
            let host_version = self.host.host_version_code();
            if let Err(e) = self
                .settings
                .lock()
                .unwrap()
                .record_sync_complete(host_version)
            {
                warn!("Failed to record sync completion: {}", e);
            }

            if outcome.stale.is_empty() {
                self.notifier.clear_updates();
            } else {
                self.notifier.updates_available(&outcome.stale);
            }
        }
        Ok(outcome)
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_running.load(Ordering::SeqCst)
    }

    /// Startup policy: sync on first run, after a host upgrade, or when
    /// the user asked for a sync at every startup. Otherwise only surface
    /// plugins that stopped being compatible.
    pub async fn startup(
        &self,
        cancel: &CancelToken,
        progress: &ProgressFn<'_>,
    ) -> Result<StartupAction> {
        let (first_run, version_changed, startup_sync) = {
            let settings = self.settings.lock().unwrap();
            let data = settings.data();
            (
                data.last_sync_time.is_none(),
                data.synced_version_code
                    .map(|v| v != self.host.host_version_code())
                    .unwrap_or(true),
                data.startup_sync,
            )
        };

        if first_run || version_changed || startup_sync {
            info!(
                "Startup sync (first run: {}, host upgraded: {}, always: {})",
                first_run, version_changed, startup_sync
            );
            let outcome = self.sync(cancel, progress).await?;
            return Ok(StartupAction::Synced(outcome));
        }

        let incompatible = self.host.loaded_incompatible_plugins();
        if incompatible.is_empty() {
            Ok(StartupAction::UpToDate)
        } else {
            Ok(StartupAction::IncompatiblePlugins(incompatible))
        }
    }
}
