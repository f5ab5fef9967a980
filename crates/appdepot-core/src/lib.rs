//! # appdepot-core
//!
//! Core library for the appdepot product catalog providing:
//! - Product record parsing, serialization, and compatibility evaluation
//! - The `PackageHost` seam over the OS package manager / plugin registry
//! - Persisted sync settings
//! - Content hashing helpers and progress reporting types

pub mod error;
pub mod hashing;
pub mod host;
pub mod product;
pub mod progress;
pub mod settings;

pub use error::{Error, Result};
pub use host::{PackageHost, PackageMetadata, PluginDescriptor, StaticHost};
pub use product::{Platform, ProductRecord, ProductType};
pub use progress::{ProgressFn, ProgressUpdate};
pub use settings::{Settings, SettingsData, SharedSettings};

use std::path::PathBuf;

/// Default data directory (~/.appdepot), overridable via APPDEPOT_HOME
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("APPDEPOT_HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir()
        .map(|h| h.join(".appdepot"))
        .ok_or_else(|| Error::data_dir_unavailable("could not determine home directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_data_dir_env_override() {
        std::env::set_var("APPDEPOT_HOME", "/tmp/depot-home");
        assert_eq!(get_data_dir().unwrap(), PathBuf::from("/tmp/depot-home"));
        std::env::remove_var("APPDEPOT_HOME");
    }

    #[test]
    #[serial]
    fn test_data_dir_defaults_under_home() {
        std::env::remove_var("APPDEPOT_HOME");
        let dir = get_data_dir().unwrap();
        assert!(dir.ends_with(".appdepot"));
    }
}
