//! Remote provider
//!
//! Pulls the product catalog from an HTTPS update server. Plain HTTP is
//! refused outright: the local cache is cleared and the failure recorded
//! without touching the network. A fetch failure also clears the cache so
//! a stale remote catalog is never served, while an authentication
//! challenge keeps the cache and flags the server for credential entry.

use crate::bundle::index_changed;
use crate::download::DownloadManager;
use crate::fetch::{FetchOutcome, IndexFetcher};
use crate::provider::{ProductProvider, RepoCache};
use crate::repository::{Repository, RepositoryType};
use anyhow::{anyhow, Context, Result};
use appdepot_core::{PackageHost, ProductRecord, ProgressFn, ProgressUpdate, SharedSettings};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Index file name inside the remote cache
pub const REMOTE_INDEX: &str = "product.inf";

pub struct RemoteProvider {
    cache_dir: PathBuf,
    cache: RepoCache,
    host: Arc<dyn PackageHost>,
    settings: SharedSettings,
    fetcher: Arc<dyn IndexFetcher>,
    downloads: DownloadManager,
    /// Set when the server demanded credentials on the last fetch
    auth_required: AtomicBool,
}

impl RemoteProvider {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        host: Arc<dyn PackageHost>,
        settings: SharedSettings,
        fetcher: Arc<dyn IndexFetcher>,
        downloads: DownloadManager,
    ) -> Self {
        let cache_dir = cache_dir.into();
        let cache = RepoCache::new(
            cache_dir.join(REMOTE_INDEX),
            RepositoryType::Remote,
            host.clone(),
        );
        Self {
            cache_dir,
            cache,
            host,
            settings,
            fetcher,
            downloads,
            auth_required: AtomicBool::new(false),
        }
    }

    fn configured_url(&self) -> Option<String> {
        let settings = self.settings.lock().unwrap();
        let data = settings.data();
        if data.remote_enabled {
            data.remote_url.clone()
        } else {
            None
        }
    }

    fn record_outcome(&self, success: bool, reason: Option<&str>) {
        if let Err(e) = self
            .settings
            .lock()
            .unwrap()
            .record_remote_sync(success, reason)
        {
            warn!("Failed to record remote sync outcome: {}", e);
        }
    }

    /// Base URL for resolving repo-relative artifact locators: the
    /// configured index URL without its file segment
    fn artifact_url(&self, record: &ProductRecord) -> Result<Url> {
        let uri = record
            .app_uri
            .as_deref()
            .ok_or_else(|| anyhow!("{} has no artifact locator", record.package_name))?;

        if let Ok(absolute) = Url::parse(uri) {
            return Ok(absolute);
        }

        let configured = self
            .configured_url()
            .ok_or_else(|| anyhow!("remote repository is not configured"))?;
        let base = Url::parse(&configured)
            .with_context(|| format!("bad update server URL: {}", configured))?;
        base.join(uri)
            .with_context(|| format!("cannot resolve artifact locator: {}", uri))
    }
}

#[async_trait]
impl ProductProvider for RemoteProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn repository(&self) -> Option<Repository> {
        self.cache.get()
    }

    async fn rebuild(&self, progress: &ProgressFn) -> Option<Repository> {
        let configured = match self.configured_url() {
            Some(url) => url,
            None => {
                debug!("Remote repository disabled");
                self.cache.replace(None);
                return None;
            }
        };

        let url = match Url::parse(&configured) {
            Ok(url) => url,
            Err(e) => {
                let reason = format!("bad update server URL {}: {}", configured, e);
                warn!("{}", reason);
                self.cache.clear();
                self.record_outcome(false, Some(&reason));
                return None;
            }
        };

        // Refuse plain HTTP before any network traffic
        if url.scheme() != "https" {
            let reason = format!("Update Server must be HTTPs: {}", configured);
            warn!("{}", reason);
            self.cache.clear();
            self.record_outcome(false, Some(&reason));
            return None;
        }

        progress(ProgressUpdate::new(
            0,
            format!("Contacting {}", url.host_str().unwrap_or("update server")),
        ));

        let index = self.cache.index_path().to_path_buf();
        let previous = index.with_extension("inf.bak");
        if index.exists() {
            if let Err(e) = std::fs::copy(&index, &previous) {
                debug!("Could not keep previous index: {}", e);
            }
        }

        match self.fetcher.fetch_index(&url, &self.cache_dir).await {
            FetchOutcome::Fetched(_) => {
                self.auth_required.store(false, Ordering::SeqCst);
                self.record_outcome(true, None);

                // Keep the previous index around only when the fetch
                // actually changed the catalog
                match index_changed(&previous, &index) {
                    Ok(true) => info!("Remote catalog changed"),
                    Ok(false) => {
                        debug!("Remote catalog unchanged, dropping backup");
                        let _ = std::fs::remove_file(&previous);
                    }
                    Err(e) => debug!("Index comparison failed: {}", e),
                }

                progress(ProgressUpdate::new(50, "Parsing remote catalog"));
                match Repository::load(&index, RepositoryType::Remote, &*self.host) {
                    Ok(repo) => {
                        self.cache.replace(repo.clone());
                        repo
                    }
                    Err(e) => {
                        warn!("Remote catalog parse failed: {}", e);
                        self.cache.clear();
                        self.record_outcome(false, Some("unparseable remote catalog"));
                        None
                    }
                }
            }
            FetchOutcome::AuthRequired => {
                info!("Update server {} requires credentials", url);
                self.auth_required.store(true, Ordering::SeqCst);
                self.record_outcome(false, Some("credentials required"));
                // Keep whatever catalog we already have
                self.cache.get()
            }
            FetchOutcome::Failed(reason) => {
                warn!("Remote catalog fetch failed: {}", reason);
                self.auth_required.store(false, Ordering::SeqCst);
                self.cache.clear();
                self.record_outcome(false, Some(&reason));
                None
            }
        }
    }

    fn installed(&self, package: &str) -> bool {
        self.cache.installed(package)
    }

    fn uninstalled(&self, package: &str) -> bool {
        self.cache.uninstalled(package)
    }

    async fn install(&self, record: &ProductRecord) -> Result<()> {
        let url = self.artifact_url(record)?;
        self.downloads
            .download_and_install(record, &url, &|_| {})
            .await
    }

    async fn uninstall(&self, record: &ProductRecord) -> Result<()> {
        crate::provider::default_uninstall(record, &*self.host)
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn needs_credentials(&self) -> bool {
        self.auth_required.load(Ordering::SeqCst)
    }
}
