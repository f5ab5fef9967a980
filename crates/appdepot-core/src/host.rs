//! The host seam: OS package manager and plugin registry, abstracted
//!
//! Everything the catalog needs from the surrounding platform flows through
//! `PackageHost`: installed-version queries, signature verification, plugin
//! API compatibility, the full plugin-registry scan, package inspection, and
//! install/uninstall requests. The OS package installer and the plugin
//! loader themselves are out of scope; this trait is the boundary.

use crate::error::{Error, Result};
use crate::progress::{ProgressFn, ProgressUpdate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// A plugin discovered by the host's plugin-registry scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub package_name: String,
    pub name: String,
    #[serde(default)]
    pub version_name: Option<String>,
    pub version_code: i32,
    #[serde(default)]
    pub plugin_api: Option<String>,
}

/// Metadata extracted from an installable artifact's manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub package_name: String,
    #[serde(default)]
    pub version_name: Option<String>,
    pub version_code: i32,
    /// Application label
    #[serde(default)]
    pub label: Option<String>,
    /// Non-localized fallback label
    #[serde(default)]
    pub non_localized_label: Option<String>,
    /// Label loaded through the package manager (last resort before the
    /// package name itself)
    #[serde(default)]
    pub loaded_label: Option<String>,
    /// `plugin-api` manifest metadata value, when present
    #[serde(default)]
    pub plugin_api: Option<String>,
    /// `app_desc` manifest metadata value, when present
    #[serde(default)]
    pub description: Option<String>,
    /// PNG icon bytes extracted from the package, when available
    #[serde(default)]
    pub icon_png: Option<Vec<u8>>,
    #[serde(default)]
    pub file_size: i64,
}

/// Abstraction over the OS package manager and plugin registry
pub trait PackageHost: Send + Sync {
    /// Installed OS API level
    fn os_api_level(&self) -> i32;

    /// Package name of the host application itself
    fn host_package(&self) -> &str;

    /// Version code of the host application
    fn host_version_code(&self) -> i32;

    /// The plugin-API baseline the running host satisfies
    fn host_api(&self) -> &str;

    /// Installed version code for a package, or None if not installed
    fn installed_version(&self, package: &str) -> Option<i32>;

    fn is_installed(&self, package: &str) -> bool {
        self.installed_version(package).is_some()
    }

    /// Verify the signing certificate of an installed package
    fn verify_signature(&self, package: &str) -> bool;

    /// Whether a plugin-API requirement string is satisfied by this host
    fn is_api_satisfied(&self, package: &str, requirement: &str) -> bool;

    /// Whether the package is a recognized plugin (loaded or loadable)
    fn is_plugin(&self, package: &str) -> bool;

    /// Previously loaded plugins that are now incompatible with this host
    fn loaded_incompatible_plugins(&self) -> Vec<String>;

    /// Full plugin-registry scan. Potentially slow; reports bounded progress.
    fn scan_plugins(&self, progress: &ProgressFn) -> Vec<PluginDescriptor>;

    /// Inspect an installable artifact's manifest, or None if unreadable
    fn inspect_package(&self, file: &Path) -> Option<PackageMetadata>;

    /// Ask the OS to install the artifact at `file`
    fn request_install(&self, file: &Path) -> Result<()>;

    /// Ask the OS to uninstall a package
    fn request_uninstall(&self, package: &str) -> Result<()>;
}

/// Extract the trailing version from a plugin-API requirement string,
/// e.g. "com.example.app.plugin-api-2.5" -> "2.5". Strings without a
/// version separator are returned unchanged.
pub fn strip_api_version(requirement: &str) -> &str {
    match requirement.rfind('-') {
        Some(idx) if idx + 1 < requirement.len() => &requirement[idx + 1..],
        _ => requirement,
    }
}

/// Serializable device state backing `StaticHost`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostState {
    /// Host application package name
    pub package: String,
    pub version_code: i32,
    /// Plugin-API baseline string
    pub api: String,
    pub os_api_level: i32,
    /// Installed packages and their version codes
    #[serde(default)]
    pub installed: HashMap<String, i32>,
    /// Plugins known to the registry scan
    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,
    /// Packages whose signature check fails
    #[serde(default)]
    pub unsigned: HashSet<String>,
    /// Previously loaded plugins now incompatible with this host
    #[serde(default)]
    pub loaded_incompatible: Vec<String>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            package: "com.atakmap.app".to_string(),
            version_code: 1,
            api: "com.atakmap.app.plugin-api-1.0".to_string(),
            os_api_level: 29,
            installed: HashMap::new(),
            plugins: Vec::new(),
            unsigned: HashSet::new(),
            loaded_incompatible: Vec::new(),
        }
    }
}

/// Deterministic in-memory host, driven by a `HostState` description.
///
/// Used by the CLI (device state loaded from JSON) and by tests. Install
/// requests take effect immediately by inspecting the artifact's sidecar
/// metadata; real platforms resolve asynchronously through OS broadcasts.
pub struct StaticHost {
    // Fixed for the lifetime of the host; kept outside the lock so the
    // trait can hand out borrows.
    package: String,
    api: String,
    state: Mutex<HostState>,
}

impl StaticHost {
    pub fn new(state: HostState) -> Self {
        Self {
            package: state.package.clone(),
            api: state.api.clone(),
            state: Mutex::new(state),
        }
    }

    /// Load host state from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let state: HostState = serde_json::from_str(&content)?;
        Ok(Self::new(state))
    }

    /// Snapshot of the current state
    pub fn state(&self) -> HostState {
        self.state.lock().unwrap().clone()
    }

    /// Mark a package installed at the given version
    pub fn set_installed(&self, package: &str, version_code: i32) {
        self.state
            .lock()
            .unwrap()
            .installed
            .insert(package.to_string(), version_code);
    }

    /// Remove a package from the installed set
    pub fn set_uninstalled(&self, package: &str) {
        self.state.lock().unwrap().installed.remove(package);
    }

    /// Sidecar metadata path for an artifact (`foo.apk` -> `foo.apk.json`)
    fn sidecar_path(file: &Path) -> PathBuf {
        let mut os = file.as_os_str().to_owned();
        os.push(".json");
        PathBuf::from(os)
    }
}

impl PackageHost for StaticHost {
    fn os_api_level(&self) -> i32 {
        self.state.lock().unwrap().os_api_level
    }

    fn host_package(&self) -> &str {
        &self.package
    }

    fn host_version_code(&self) -> i32 {
        self.state.lock().unwrap().version_code
    }

    fn host_api(&self) -> &str {
        &self.api
    }

    fn installed_version(&self, package: &str) -> Option<i32> {
        self.state.lock().unwrap().installed.get(package).copied()
    }

    fn verify_signature(&self, package: &str) -> bool {
        !self.state.lock().unwrap().unsigned.contains(package)
    }

    fn is_api_satisfied(&self, _package: &str, requirement: &str) -> bool {
        requirement.is_empty() || requirement == self.api
    }

    fn is_plugin(&self, package: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .plugins
            .iter()
            .any(|p| p.package_name == package)
    }

    fn loaded_incompatible_plugins(&self) -> Vec<String> {
        self.state.lock().unwrap().loaded_incompatible.clone()
    }

    fn scan_plugins(&self, progress: &ProgressFn) -> Vec<PluginDescriptor> {
        let plugins = self.state.lock().unwrap().plugins.clone();
        let total = plugins.len().max(1);
        for (i, plugin) in plugins.iter().enumerate() {
            progress(ProgressUpdate::new(
                (i * 100 / total) as u8,
                format!("Scanning {}", plugin.package_name),
            ));
        }
        plugins
    }

    fn inspect_package(&self, file: &Path) -> Option<PackageMetadata> {
        let sidecar = Self::sidecar_path(file);
        let content = match std::fs::read_to_string(&sidecar) {
            Ok(c) => c,
            Err(_) => {
                debug!("No package metadata sidecar for {}", file.display());
                return None;
            }
        };

        match serde_json::from_str::<PackageMetadata>(&content) {
            Ok(mut meta) => {
                if meta.file_size <= 0 {
                    meta.file_size = std::fs::metadata(file).map(|m| m.len() as i64).unwrap_or(-1);
                }
                Some(meta)
            }
            Err(e) => {
                warn!("Failed to parse package metadata {}: {}", sidecar.display(), e);
                None
            }
        }
    }

    fn request_install(&self, file: &Path) -> Result<()> {
        let meta = self.inspect_package(file).ok_or_else(|| {
            Error::install_failed(format!("unreadable package: {}", file.display()))
        })?;

        info!(
            "Installing {} v{} from {}",
            meta.package_name,
            meta.version_code,
            file.display()
        );
        self.set_installed(&meta.package_name, meta.version_code);
        Ok(())
    }

    fn request_uninstall(&self, package: &str) -> Result<()> {
        if self.installed_version(package).is_none() {
            return Err(Error::uninstall_failed(format!(
                "{} is not installed",
                package
            )));
        }

        info!("Uninstalling {}", package);
        self.set_uninstalled(package);
        Ok(())
    }
}
