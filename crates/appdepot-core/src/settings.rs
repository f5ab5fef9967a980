//! Persisted sync settings
//!
//! Key-value state the catalog carries between runs: when the last sync
//! happened and for which host version, whether the remote update server is
//! enabled and where it lives, and the outcome of the last remote fetch.
//! Stored as a single JSON file under the data directory.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Settings file name under the data directory
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsData {
    /// When the last full sync completed
    #[serde(default)]
    pub last_sync_time: Option<DateTime<Utc>>,

    /// Host version code recorded at the last full sync
    #[serde(default)]
    pub synced_version_code: Option<i32>,

    /// Remote update server enabled
    #[serde(default)]
    pub remote_enabled: bool,

    /// Remote update server URL
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Sync at every startup rather than only on first run / version change
    #[serde(default)]
    pub startup_sync: bool,

    /// Whether the last remote fetch succeeded
    #[serde(default)]
    pub last_remote_sync_success: Option<bool>,

    /// Human-readable reason recorded when the last remote fetch failed
    #[serde(default)]
    pub last_remote_sync_reason: Option<String>,

    #[serde(default)]
    pub last_remote_sync_time: Option<DateTime<Utc>>,

    /// Host version code for which the bundled index was last deployed
    #[serde(default)]
    pub bundled_deployed_version: Option<i32>,
}

/// Settings persisted to a JSON file
pub struct Settings {
    path: PathBuf,
    data: SettingsData,
}

/// Settings shared across providers and the registry
pub type SharedSettings = Arc<Mutex<Settings>>;

impl Settings {
    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            debug!("No settings at {}, using defaults", path.display());
            SettingsData::default()
        };
        Ok(Self { path, data })
    }

    /// Create in-memory settings persisted under `dir`
    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::load(dir.join(SETTINGS_FILE))
    }

    /// Wrap into the shared handle
    pub fn into_shared(self) -> SharedSettings {
        Arc::new(Mutex::new(self))
    }

    pub fn data(&self) -> &SettingsData {
        &self.data
    }

    /// Apply a mutation and persist the result
    pub fn update(&mut self, f: impl FnOnce(&mut SettingsData)) -> Result<()> {
        f(&mut self.data);
        self.save()
    }

    /// Record the outcome of a remote fetch attempt
    pub fn record_remote_sync(&mut self, success: bool, reason: Option<&str>) -> Result<()> {
        self.update(|d| {
            d.last_remote_sync_success = Some(success);
            d.last_remote_sync_reason = reason.map(|r| r.to_string());
            d.last_remote_sync_time = Some(Utc::now());
        })
    }

    /// Record completion of a full sync for the given host version
    pub fn record_sync_complete(&mut self, host_version_code: i32) -> Result<()> {
        self.update(|d| {
            d.last_sync_time = Some(Utc::now());
            d.synced_version_code = Some(host_version_code);
        })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
