//! Command implementations

pub mod install;
pub mod list;
pub mod show;
pub mod sync;
pub mod uninstall;

use anyhow::{Context, Result};
use appdepot_core::host::HostState;
use appdepot_core::{get_data_dir, Settings, SharedSettings, StaticHost};
use appdepot_repos::fetch::{HttpFetcher, NoCredentials};
use appdepot_repos::{
    BundledProvider, DownloadManager, FileSystemProvider, LogNotifier, ProviderRegistry,
    RemoteProvider, SideloadedProvider,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Depot configuration, read from depot.json
#[derive(Debug, Default, Deserialize)]
pub struct DepotConfig {
    /// Writable data directory; defaults to the appdepot home
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Read-only asset directory holding the bundled catalog
    #[serde(default)]
    pub bundled_dir: Option<PathBuf>,

    /// User-managed directory of artifacts; defaults to data_dir/custom
    #[serde(default)]
    pub custom_dir: Option<PathBuf>,

    /// Host state file; defaults to data_dir/host.json
    #[serde(default)]
    pub host_state: Option<PathBuf>,
}

impl DepotConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = get_data_dir()?.join("depot.json");
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

/// A fully wired registry plus the pieces commands need alongside it
pub struct Depot {
    pub host: Arc<StaticHost>,
    pub settings: SharedSettings,
    pub registry: ProviderRegistry,
    host_state_path: PathBuf,
}

impl Depot {
    /// Wire the four providers in precedence order against the configured
    /// directories
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = DepotConfig::load(config_path)?;
        let data_dir = match config.data_dir {
            Some(dir) => dir,
            None => get_data_dir()?,
        };
        std::fs::create_dir_all(&data_dir)?;
        debug!("Using data directory {}", data_dir.display());

        let host_state_path = config
            .host_state
            .unwrap_or_else(|| data_dir.join("host.json"));
        let host = Arc::new(if host_state_path.exists() {
            StaticHost::load(&host_state_path)?
        } else {
            StaticHost::new(HostState::default())
        });

        let settings = Settings::in_dir(&data_dir)?.into_shared();
        let notifier = Arc::new(LogNotifier);
        let registry = ProviderRegistry::new(host.clone(), settings.clone(), notifier);

        if let Some(bundled_dir) = config.bundled_dir {
            registry.register(Arc::new(BundledProvider::new(
                bundled_dir,
                data_dir.join("bundled"),
                host.clone(),
                settings.clone(),
            )));
        }

        let custom_dir = config.custom_dir.unwrap_or_else(|| data_dir.join("custom"));
        registry.register(Arc::new(FileSystemProvider::new(custom_dir, host.clone())));

        let fetcher = Arc::new(HttpFetcher::new(Box::new(NoCredentials))?);
        let downloads = DownloadManager::new(data_dir.join("downloads"), host.clone())?;
        registry.register(Arc::new(RemoteProvider::new(
            data_dir.join("remote"),
            host.clone(),
            settings.clone(),
            fetcher,
            downloads,
        )));

        registry.register(Arc::new(SideloadedProvider::new(
            data_dir.join("sideloaded"),
            host.clone(),
        )));

        Ok(Self {
            host,
            settings,
            registry,
            host_state_path,
        })
    }

    /// Persist the host state so install effects survive the process
    pub fn save_host_state(&self) -> Result<()> {
        let state = self.host.state();
        let content = serde_json::to_string_pretty(&state)?;
        std::fs::write(&self.host_state_path, content)
            .with_context(|| format!("failed to write {}", self.host_state_path.display()))
    }
}
