//! Sideloaded provider
//!
//! Covers plugins that arrived outside any repository: installed by hand,
//! pushed over a debug bridge, whatever. Rebuild scans the host's plugin
//! registry and synthesizes minimal identity-only records. The set also
//! grows reactively: when the host reports an install of a plugin no other
//! record covers, a stub is appended so the catalog can track it.

use crate::provider::{default_uninstall, ProductProvider, RepoCache};
use crate::repository::{Repository, RepositoryType};
use anyhow::{bail, Result};
use appdepot_core::progress::ProgressThrottle;
use appdepot_core::{PackageHost, ProductRecord, ProgressFn};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Index file name inside the cache directory
pub const SIDELOADED_INDEX: &str = "sideloaded.inf";

/// Registry scans fire progress per package; keep the reporting bounded
const SCAN_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

pub struct SideloadedProvider {
    cache: RepoCache,
    host: Arc<dyn PackageHost>,
}

impl SideloadedProvider {
    pub fn new(cache_dir: impl Into<PathBuf>, host: Arc<dyn PackageHost>) -> Self {
        let cache = RepoCache::new(
            cache_dir.into().join(SIDELOADED_INDEX),
            RepositoryType::Sideloaded,
            host.clone(),
        );
        Self { cache, host }
    }

    fn record_for(&self, package: &str, version_code: i32) -> ProductRecord {
        let mut record = ProductRecord::minimal(package, package, version_code.max(0));
        record.repo_key = Some(self.cache.index_path().to_string_lossy().to_string());
        record.set_installed_version(Some(version_code));
        record
    }
}

#[async_trait]
impl ProductProvider for SideloadedProvider {
    fn name(&self) -> &'static str {
        "sideloaded"
    }

    fn repository(&self) -> Option<Repository> {
        self.cache.get()
    }

    async fn rebuild(&self, progress: &ProgressFn) -> Option<Repository> {
        let throttle = ProgressThrottle::new(SCAN_PROGRESS_INTERVAL);
        let plugins = self.host.scan_plugins(&move |update| {
            if throttle.accept(update.percent) {
                progress(update);
            }
        });

        let repo_key = self.cache.index_path().to_string_lossy().to_string();
        let products: Vec<ProductRecord> = plugins
            .iter()
            .map(|p| {
                let mut record =
                    ProductRecord::minimal(&p.package_name, &p.name, p.version_code.max(0));
                record.repo_key = Some(repo_key.clone());
                record.set_installed_version(self.host.installed_version(&p.package_name));
                record
            })
            .collect();

        debug!("Plugin registry scan found {} plugins", products.len());
        let repo = Repository::with_products(
            self.cache.index_path(),
            RepositoryType::Sideloaded,
            products,
        );
        if let Err(e) = repo.save() {
            warn!("Failed to persist sideloaded index: {}", e);
        }
        self.cache.replace(Some(repo.clone()));
        Some(repo)
    }

    fn installed(&self, package: &str) -> bool {
        if !self.host.is_plugin(package) {
            return false;
        }
        self.cache.installed(package)
    }

    /// Appends a stub for a plugin that arrived outside every catalog, so
    /// the sideloaded set can track it from now on
    fn adopt_unknown(&self, package: &str) -> bool {
        if !self.host.is_plugin(package) || self.cache.contains(package) {
            return false;
        }
        let version = match self.host.installed_version(package) {
            Some(v) => v,
            None => return false,
        };
        let record = self.record_for(package, version);
        let mut repo = self.cache.get().unwrap_or_else(|| {
            Repository::empty(self.cache.index_path(), RepositoryType::Sideloaded)
        });
        repo.add_product(record);
        if let Err(e) = repo.save() {
            warn!("Failed to persist sideloaded index: {}", e);
        }
        self.cache.replace(Some(repo));
        true
    }

    fn uninstalled(&self, package: &str) -> bool {
        self.cache.uninstalled(package)
    }

    async fn install(&self, record: &ProductRecord) -> Result<()> {
        // Sideloaded stubs carry no artifact to install from
        bail!(
            "{} was sideloaded and has no installable artifact",
            record.package_name
        );
    }

    async fn uninstall(&self, record: &ProductRecord) -> Result<()> {
        default_uninstall(record, &*self.host)
    }
}
