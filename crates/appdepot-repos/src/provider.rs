//! The product provider contract
//!
//! Each provider owns one repository source. `repository()` answers from a
//! lazily loaded cache; `rebuild` reconstructs the repository from the
//! source of truth and may block on I/O, so it is async. Install and
//! uninstall default to handing the artifact to the OS package host.

use crate::repository::{Repository, RepositoryType};
use anyhow::{Context, Result};
use appdepot_core::product::resolve_uri;
use appdepot_core::{PackageHost, ProductRecord, ProgressFn};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

#[async_trait]
pub trait ProductProvider: Send + Sync {
    /// Short stable name, used in logs and progress messages
    fn name(&self) -> &'static str;

    /// Snapshot of the cached repository, loading it lazily on first use.
    /// None when the source has never produced an index.
    fn repository(&self) -> Option<Repository>;

    /// Reconstruct the repository from the source of truth. Blocking I/O
    /// and network happen here, never in `repository()`.
    async fn rebuild(&self, progress: &ProgressFn) -> Option<Repository>;

    fn contains(&self, package: &str) -> bool {
        self.repository()
            .map(|r| r.has_product(package))
            .unwrap_or(false)
    }

    /// React to a package install observed on the host. Returns true when
    /// this provider's stored state changed.
    fn installed(&self, package: &str) -> bool;

    /// React to a package removal observed on the host
    fn uninstalled(&self, package: &str) -> bool;

    /// Claim a freshly installed package that no provider has a record
    /// for. Returns true when this provider took ownership of it.
    fn adopt_unknown(&self, _package: &str) -> bool {
        false
    }

    async fn install(&self, record: &ProductRecord) -> Result<()>;

    async fn uninstall(&self, record: &ProductRecord) -> Result<()>;

    /// Remote providers fetch over the network during rebuild
    fn is_remote(&self) -> bool {
        false
    }

    /// Whether the last rebuild stopped at an authentication challenge.
    /// The caller is expected to collect credentials and retry the sync.
    fn needs_credentials(&self) -> bool {
        false
    }
}

struct CacheSlot {
    /// Whether a load from disk has been attempted at all
    attempted: bool,
    repo: Option<Repository>,
}

/// Lazily loaded, persistently backed repository cache shared by the
/// provider implementations
pub struct RepoCache {
    index_path: PathBuf,
    repo_type: RepositoryType,
    host: Arc<dyn PackageHost>,
    slot: RwLock<CacheSlot>,
}

impl RepoCache {
    pub fn new(
        index_path: impl Into<PathBuf>,
        repo_type: RepositoryType,
        host: Arc<dyn PackageHost>,
    ) -> Self {
        Self {
            index_path: index_path.into(),
            repo_type,
            host,
            slot: RwLock::new(CacheSlot {
                attempted: false,
                repo: None,
            }),
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Cached repository, loading from the index file on first call
    pub fn get(&self) -> Option<Repository> {
        {
            let slot = self.slot.read().unwrap();
            if slot.attempted {
                return slot.repo.clone();
            }
        }

        let mut slot = self.slot.write().unwrap();
        if !slot.attempted {
            slot.attempted = true;
            slot.repo = match Repository::load(&self.index_path, self.repo_type, &*self.host) {
                Ok(repo) => repo,
                Err(e) => {
                    warn!("Failed to load {}: {}", self.index_path.display(), e);
                    None
                }
            };
        }
        slot.repo.clone()
    }

    /// Replace the cached repository outright
    pub fn replace(&self, repo: Option<Repository>) {
        let mut slot = self.slot.write().unwrap();
        slot.attempted = true;
        slot.repo = repo;
    }

    /// Forget the cached repository so the next `get` re-reads the index
    /// from disk
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap();
        slot.attempted = false;
        slot.repo = None;
    }

    /// Drop the cache and delete the backing index file
    pub fn clear(&self) {
        self.replace(None);
        if self.index_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.index_path) {
                warn!("Failed to remove {}: {}", self.index_path.display(), e);
            }
        }
    }

    pub fn contains(&self, package: &str) -> bool {
        self.get().map(|r| r.has_product(package)).unwrap_or(false)
    }

    /// Reconcile an install with the cached repository and persist when the
    /// stored state changed
    pub fn installed(&self, package: &str) -> bool {
        self.patch(|repo, host| repo.installed(package, host))
    }

    /// Reconcile a removal with the cached repository and persist when the
    /// stored state changed
    pub fn uninstalled(&self, package: &str) -> bool {
        self.patch(|repo, _| repo.uninstalled(package))
    }

    fn patch(&self, f: impl FnOnce(&mut Repository, &dyn PackageHost) -> bool) -> bool {
        // Force the lazy load before taking the write lock
        if self.get().is_none() {
            return false;
        }

        let mut slot = self.slot.write().unwrap();
        let repo = match slot.repo.as_mut() {
            Some(repo) => repo,
            None => return false,
        };
        if !f(repo, &*self.host) {
            return false;
        }
        if let Err(e) = repo.save() {
            warn!("Failed to persist {}: {}", self.index_path.display(), e);
        }
        true
    }
}

/// Default install path: resolve the artifact locator to a local file and
/// hand it to the OS package host
pub fn default_install(
    record: &ProductRecord,
    index_path: &Path,
    host: &dyn PackageHost,
) -> Result<()> {
    let uri = record
        .app_uri
        .as_deref()
        .with_context(|| format!("{} has no artifact locator", record.package_name))?;
    let artifact = resolve_uri(uri, index_path);
    debug!(
        "Installing {} from {}",
        record.package_name,
        artifact.display()
    );
    host.request_install(&artifact)
        .with_context(|| format!("failed to install {}", record.package_name))
}

pub fn default_uninstall(record: &ProductRecord, host: &dyn PackageHost) -> Result<()> {
    host.request_uninstall(&record.package_name)
        .with_context(|| format!("failed to uninstall {}", record.package_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use appdepot_core::host::{HostState, StaticHost};

    fn full_line(pkg: &str, revision: i32) -> String {
        format!(
            "Android,plugin,{pkg},Example,1.0,{revision},https://a/x.apk,https://a/x.png,A tool,abc123,21,com.atakmap.app.plugin-api-1.0,2048"
        )
    }

    #[test]
    fn test_cache_loads_lazily_and_once() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("product.inf");
        std::fs::write(&index, format!("{}\n", full_line("com.a", 1))).unwrap();

        let host: Arc<dyn PackageHost> = Arc::new(StaticHost::new(HostState::default()));
        let cache = RepoCache::new(&index, RepositoryType::Remote, host);

        assert!(cache.contains("com.a"));

        // The cache answers even after the backing file disappears
        std::fs::remove_file(&index).unwrap();
        assert!(cache.contains("com.a"));
    }

    #[test]
    fn test_cache_missing_index_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let host: Arc<dyn PackageHost> = Arc::new(StaticHost::new(HostState::default()));
        let cache = RepoCache::new(
            dir.path().join("absent.inf"),
            RepositoryType::Bundled,
            host,
        );
        assert!(cache.get().is_none());
        assert!(!cache.installed("com.a"));
    }

    #[test]
    fn test_patch_persists_state_change() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("product.inf");
        std::fs::write(&index, format!("{}\n", full_line("com.a", 4))).unwrap();

        let static_host = Arc::new(StaticHost::new(HostState::default()));
        let host: Arc<dyn PackageHost> = static_host.clone();
        let cache = RepoCache::new(&index, RepositoryType::Remote, host.clone());

        // Load first so the record is cached as not-installed
        assert!(cache.contains("com.a"));
        static_host.set_installed("com.a", 4);
        assert!(cache.installed("com.a"));

        // A fresh cache sees the persisted installed version
        let fresh = RepoCache::new(&index, RepositoryType::Remote, host);
        let repo = fresh.get().unwrap();
        // installed_version is looked up live at parse time
        assert_eq!(repo.product("com.a").unwrap().installed_version, 4);
    }

    #[test]
    fn test_invalidate_rereads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("product.inf");
        std::fs::write(&index, format!("{}\n", full_line("com.a", 1))).unwrap();

        let host: Arc<dyn PackageHost> = Arc::new(StaticHost::new(HostState::default()));
        let cache = RepoCache::new(&index, RepositoryType::Bundled, host);
        assert!(cache.contains("com.a"));

        // A new index lands on disk; invalidate makes the next get load it
        std::fs::write(&index, format!("{}\n", full_line("com.b", 1))).unwrap();
        cache.invalidate();
        assert!(cache.contains("com.b"));
        assert!(!cache.contains("com.a"));
    }

    #[test]
    fn test_clear_removes_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("product.inf");
        std::fs::write(&index, format!("{}\n", full_line("com.a", 1))).unwrap();

        let host: Arc<dyn PackageHost> = Arc::new(StaticHost::new(HostState::default()));
        let cache = RepoCache::new(&index, RepositoryType::Remote, host);
        assert!(cache.get().is_some());

        cache.clear();
        assert!(cache.get().is_none());
        assert!(!index.exists());
    }
}
