//! Filesystem provider
//!
//! Watches a user-managed directory of artifacts. Rebuild prefers an
//! explicit compressed bundle dropped into the directory; when the bundle's
//! record count disagrees with the artifacts actually on disk it falls back
//! to scanning the artifacts themselves and synthesizing an index. A
//! directory with no artifacts at all yields an explicitly empty index.

use crate::bundle::extract_bundle;
use crate::provider::{default_install, default_uninstall, ProductProvider, RepoCache};
use crate::repository::{Repository, RepositoryType};
use anyhow::Result;
use appdepot_core::{PackageHost, ProductRecord, ProgressFn, ProgressUpdate};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Index file name inside the custom directory
pub const CUSTOM_INDEX: &str = "custom.inf";

/// Compressed bundle name inside the custom directory
pub const CUSTOM_BUNDLE: &str = "custom.infz";

const ARTIFACT_EXTENSION: &str = "apk";

pub struct FileSystemProvider {
    custom_dir: PathBuf,
    cache: RepoCache,
    host: Arc<dyn PackageHost>,
}

impl FileSystemProvider {
    pub fn new(custom_dir: impl Into<PathBuf>, host: Arc<dyn PackageHost>) -> Self {
        let custom_dir = custom_dir.into();
        let cache = RepoCache::new(
            custom_dir.join(CUSTOM_INDEX),
            RepositoryType::FileSystem,
            host.clone(),
        );
        Self {
            custom_dir,
            cache,
            host,
        }
    }

    /// Installable artifacts under the custom directory
    fn artifacts(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.custom_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Extract and parse the dropped bundle, discarding its index when the
    /// record count disagrees with the artifacts on disk after extraction
    fn repo_from_bundle(&self) -> Option<Repository> {
        let bundle = self.custom_dir.join(CUSTOM_BUNDLE);
        if !bundle.exists() {
            return None;
        }
        if let Err(e) = extract_bundle(&bundle, &self.custom_dir) {
            warn!("Custom bundle extraction failed: {}", e);
            return None;
        }

        let index = self.cache.index_path();
        let repo = match Repository::load(index, RepositoryType::FileSystem, &*self.host) {
            Ok(Some(repo)) => repo,
            Ok(None) => return None,
            Err(e) => {
                warn!("Custom index parse failed: {}", e);
                return None;
            }
        };

        let artifact_count = self.artifacts().len();
        if repo.len() != artifact_count {
            info!(
                "Custom index lists {} products but {} artifacts are on disk, rescanning",
                repo.len(),
                artifact_count
            );
            return None;
        }
        Some(repo)
    }

    /// Scan artifacts and synthesize an index from their manifests
    fn repo_from_scan(&self, artifacts: &[PathBuf], progress: &ProgressFn) -> Repository {
        let index = self.cache.index_path().to_path_buf();
        let repo_key = index.to_string_lossy().to_string();
        let total = artifacts.len().max(1);
        let mut products = Vec::new();

        for (i, artifact) in artifacts.iter().enumerate() {
            progress(ProgressUpdate::new(
                (i * 100 / total) as u8,
                format!("Scanning {}", file_label(artifact)),
            ));
            match ProductRecord::from_package_file(
                Some(&repo_key),
                artifact,
                &self.custom_dir,
                &*self.host,
            ) {
                Some(record) => products.push(record),
                None => debug!("Skipping unreadable artifact {}", artifact.display()),
            }
        }
        Repository::with_products(index, RepositoryType::FileSystem, products)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[async_trait]
impl ProductProvider for FileSystemProvider {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn repository(&self) -> Option<Repository> {
        self.cache.get()
    }

    async fn rebuild(&self, progress: &ProgressFn) -> Option<Repository> {
        if !self.custom_dir.exists() {
            debug!("No custom directory at {}", self.custom_dir.display());
            return None;
        }

        let repo = match self.repo_from_bundle() {
            Some(repo) => repo,
            None => self.repo_from_scan(&self.artifacts(), progress),
        };

        // An empty index is a valid repository; persist it explicitly
        if let Err(e) = repo.save() {
            warn!("Failed to persist custom index: {}", e);
        }
        self.cache.replace(Some(repo.clone()));
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
