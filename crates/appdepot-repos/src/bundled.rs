//! Bundled provider
//!
//! Source of truth is a read-only asset directory shipped with the
//! application. The bundled index is copied to a writable cache the first
//! time it is needed, and re-deployed when the host version changes.
//! Icon assets referenced by the index are extracted lazily: only when
//! missing on disk or when the bundled revision is ahead of the installed
//! version.

use crate::provider::{default_install, default_uninstall, ProductProvider, RepoCache};
use crate::repository::{Repository, RepositoryType};
use anyhow::Result;
use appdepot_core::product::resolve_uri;
use appdepot_core::{PackageHost, ProductRecord, ProgressFn, ProgressUpdate, SharedSettings};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Index file name inside the asset directory and the cache
pub const BUNDLED_INDEX: &str = "bundled.inf";

pub struct BundledProvider {
    assets_dir: PathBuf,
    cache_dir: PathBuf,
    cache: RepoCache,
    host: Arc<dyn PackageHost>,
    settings: SharedSettings,
}

impl BundledProvider {
    pub fn new(
        assets_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        host: Arc<dyn PackageHost>,
        settings: SharedSettings,
    ) -> Self {
        let cache_dir = cache_dir.into();
        let cache = RepoCache::new(
            cache_dir.join(BUNDLED_INDEX),
            RepositoryType::Bundled,
            host.clone(),
        );
        Self {
            assets_dir: assets_dir.into(),
            cache_dir,
            cache,
            host,
            settings,
        }
    }

    fn bundled_index(&self) -> PathBuf {
        self.assets_dir.join(BUNDLED_INDEX)
    }

    /// Copy the bundled index into the cache. Skipped when already
    /// deployed for this host version, unless `force`.
    fn deploy_index(&self, force: bool) -> Result<bool> {
        let source = self.bundled_index();
        if !source.exists() {
            debug!("No bundled index at {}", source.display());
            return Ok(false);
        }

        let target = self.cache.index_path().to_path_buf();
        let host_version = self.host.host_version_code();
        let deployed_for = self
            .settings
            .lock()
            .unwrap()
            .data()
            .bundled_deployed_version;

        if !force && target.exists() && deployed_for == Some(host_version) {
            return Ok(true);
        }

        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::copy(&source, &target)?;
        info!("Deployed bundled index to {}", target.display());

        self.settings
            .lock()
            .unwrap()
            .update(|d| d.bundled_deployed_version = Some(host_version))?;
        self.cache.invalidate();
        Ok(true)
    }

    /// Extract an icon asset beside the cached index when it is missing or
    /// the bundled revision is ahead of what is installed
    fn refresh_icon(&self, record: &ProductRecord, index_path: &Path) {
        let icon_uri = match record.icon_uri.as_deref() {
            Some(uri) => uri,
            None => return,
        };
        let target = resolve_uri(icon_uri, index_path);
        let installed_behind = record.is_installed() && record.installed_version < record.revision;
        if target.exists() && !installed_behind {
            return;
        }

        let source = self.assets_dir.join(
            target
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(icon_uri)),
        );
        if !source.exists() {
            debug!("No bundled icon asset for {}", record.package_name);
            return;
        }
        if let Some(parent) = target.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Cannot create {}: {}", parent.display(), e);
                return;
            }
        }
        match std::fs::copy(&source, &target) {
            Ok(_) => debug!("Extracted icon for {}", record.package_name),
            Err(e) => warn!("Icon extraction for {} failed: {}", record.package_name, e),
        }
    }
}

#[async_trait]
impl ProductProvider for BundledProvider {
    fn name(&self) -> &'static str {
        "bundled"
    }

    fn repository(&self) -> Option<Repository> {
        if let Err(e) = self.deploy_index(false) {
            warn!("Bundled index deployment failed: {}", e);
        }
        self.cache.get()
    }

    async fn rebuild(&self, progress: &ProgressFn) -> Option<Repository> {
        progress(ProgressUpdate::new(0, "Deploying bundled catalog"));
        match self.deploy_index(true) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!("Bundled index deployment failed: {}", e);
                return None;
            }
        }

        let repo = self.cache.get()?;
        let total = repo.len().max(1);
        for (i, record) in repo.products().iter().enumerate() {
            progress(ProgressUpdate::new(
                (i * 100 / total) as u8,
                format!("Checking {}", record.simple_name),
            ));
            self.refresh_icon(record, repo.index_path());
        }
        Some(repo)
    }

    fn installed(&self, package: &str) -> bool {
        self.cache.installed(package)
    }

    fn uninstalled(&self, package: &str) -> bool {
        self.cache.uninstalled(package)
    }

    async fn install(&self, record: &ProductRecord) -> Result<()> {
        default_install(record, self.cache.index_path(), &*self.host)
    }

    async fn uninstall(&self, record: &ProductRecord) -> Result<()> {
        default_uninstall(record, &*self.host)
    }
}
