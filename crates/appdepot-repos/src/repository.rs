//! Repository: one parsed index file
//!
//! A repository is the set of product records read from a single index
//! file, identified by the index path. Parsing is line-tolerant: a record
//! that fails to parse is logged and dropped, never failing the whole
//! index. An empty repository is a valid repository.

use appdepot_core::{PackageHost, ProductRecord, Result};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which provider family a repository belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    Bundled,
    FileSystem,
    Remote,
    Sideloaded,
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundled => write!(f, "bundled"),
            Self::FileSystem => write!(f, "filesystem"),
            Self::Remote => write!(f, "remote"),
            Self::Sideloaded => write!(f, "sideloaded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Repository {
    index_path: PathBuf,
    repo_type: RepositoryType,
    products: Vec<ProductRecord>,
}

/// Repositories are identified by their index path
impl PartialEq for Repository {
    fn eq(&self, other: &Self) -> bool {
        self.index_path == other.index_path
    }
}

impl Eq for Repository {}

impl Repository {
    pub fn empty(index_path: impl Into<PathBuf>, repo_type: RepositoryType) -> Self {
        Self {
            index_path: index_path.into(),
            repo_type,
            products: Vec::new(),
        }
    }

    pub fn with_products(
        index_path: impl Into<PathBuf>,
        repo_type: RepositoryType,
        products: Vec<ProductRecord>,
    ) -> Self {
        Self {
            index_path: index_path.into(),
            repo_type,
            products,
        }
    }

    /// Parse an index from a reader. Comment lines start with `#`; blank
    /// lines and unparseable records are skipped.
    pub fn parse_reader(
        reader: impl Read,
        index_path: impl Into<PathBuf>,
        repo_type: RepositoryType,
        host: &dyn PackageHost,
    ) -> Result<Self> {
        let index_path = index_path.into();
        let repo_key = index_path.to_string_lossy().to_string();
        let mut products = Vec::new();

        for line in BufReader::new(reader).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match ProductRecord::from_index_line(trimmed, Some(&repo_key), host) {
                Some(record) => products.push(record),
                None => warn!("Discarding index line: {}", trimmed),
            }
        }

        debug!(
            "Parsed {} products from {}",
            products.len(),
            index_path.display()
        );
        Ok(Self {
            index_path,
            repo_type,
            products,
        })
    }

    /// Load an index file, or None when it does not exist
    pub fn load(
        index_path: &Path,
        repo_type: RepositoryType,
        host: &dyn PackageHost,
    ) -> Result<Option<Self>> {
        if !index_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(index_path)?;
        Ok(Some(Self::parse_reader(
            file, index_path, repo_type, host,
        )?))
    }

    /// Write the index back in canonical form, one record per line
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = String::new();
        for product in &self.products {
            out.push_str(&product.to_index_line());
            out.push('\n');
        }
        std::fs::write(&self.index_path, out)?;
        debug!(
            "Saved {} products to {}",
            self.products.len(),
            self.index_path.display()
        );
        Ok(())
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Index path as the key records carry back to their repository
    pub fn repo_key(&self) -> String {
        self.index_path.to_string_lossy().to_string()
    }

    pub fn repo_type(&self) -> RepositoryType {
        self.repo_type
    }

    pub fn products(&self) -> &[ProductRecord] {
        &self.products
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn product(&self, package: &str) -> Option<&ProductRecord> {
        self.products.iter().find(|p| p.package_name == package)
    }

    pub fn product_mut(&mut self, package: &str) -> Option<&mut ProductRecord> {
        self.products.iter_mut().find(|p| p.package_name == package)
    }

    pub fn has_product(&self, package: &str) -> bool {
        self.product(package).is_some()
    }

    pub fn add_product(&mut self, record: ProductRecord) {
        self.products.push(record);
    }

    pub fn remove_product(&mut self, package: &str) -> bool {
        let before = self.products.len();
        self.products.retain(|p| p.package_name != package);
        self.products.len() != before
    }

    /// Merge this repository's records into `map`, skipping packages
    /// already claimed by an earlier repository
    pub fn merge_unique_into(&self, map: &mut HashMap<String, ProductRecord>) {
        for product in &self.products {
            if !map.contains_key(&product.package_name) {
                map.insert(product.package_name.clone(), product.clone());
            }
        }
    }

    /// A record is stale when its package is installed right now and the
    /// installed version code is behind the offered revision
    pub fn is_stale(record: &ProductRecord, host: &dyn PackageHost) -> bool {
        match host.installed_version(&record.package_name) {
            Some(installed) => installed < record.revision,
            None => false,
        }
    }

    pub fn stale_products(&self, host: &dyn PackageHost) -> Vec<&ProductRecord> {
        self.products
            .iter()
            .filter(|p| Self::is_stale(p, host))
            .collect()
    }

    /// Reconcile a record with the live installed version. Returns true
    /// when the stored state changed and the index should be persisted.
    pub fn installed(&mut self, package: &str, host: &dyn PackageHost) -> bool {
        let live = host.installed_version(package);
        match self.product_mut(package) {
            Some(record) => {
                let previous = record.installed_version;
                record.set_installed_version(live);
                record.installed_version != previous
            }
            None => false,
        }
    }

    /// Reconcile a record with a package removal. Returns true when the
    /// stored state changed.
    pub fn uninstalled(&mut self, package: &str) -> bool {
        match self.product_mut(package) {
            Some(record) if record.is_installed() => {
                record.set_installed_version(None);
                true
            }
            _ => false,
        }
    }

    /// A repository is valid when it knows where its index lives and
    /// every record it carries is valid
    pub fn is_valid(&self, host: &dyn PackageHost) -> bool {
        !self.index_path.as_os_str().is_empty() && self.products.iter().all(|p| p.is_valid(host))
    }

    pub fn search(&self, terms: &str) -> Vec<&ProductRecord> {
        self.products.iter().filter(|p| p.matches(terms)).collect()
    }
}
