//! Error types for appdepot-core

use thiserror::Error;

/// Result type alias using appdepot-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for appdepot
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Data directory could not be resolved
    #[error("Data directory unavailable: {message}")]
    DataDirUnavailable { message: String },

    /// A product record failed validation
    #[error("Invalid product: {package}")]
    InvalidProduct { package: String },

    /// Downloaded content did not match the expected hash
    #[error("Integrity check failed for '{name}': expected SHA-256 {expected}, got {actual}")]
    IntegrityMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Remote update server is not configured with HTTPS
    #[error("Update Server must be HTTPs: {url}")]
    HttpsRequired { url: String },

    /// Remote fetch requires credentials
    #[error("Credentials required for {host}")]
    CredentialsRequired { host: String },

    /// Index bundle fetch failed
    #[error("Fetch failed: {reason}")]
    FetchFailed { reason: String },

    /// Install request could not proceed
    #[error("Install failed: {message}")]
    InstallFailed { message: String },

    /// Uninstall request could not proceed
    #[error("Uninstall failed: {message}")]
    UninstallFailed { message: String },

    /// No provider offers the requested package
    #[error("No provider found for: {package}")]
    NoProvider { package: String },

    /// A repository sync is already in flight
    #[error("Sync task already running")]
    SyncInProgress,

    /// A download-and-install sequence is already in flight
    #[error("Download already in progress")]
    DownloadInProgress,
}

impl Error {
    /// Create a data-dir-unavailable error
    pub fn data_dir_unavailable(message: impl Into<String>) -> Self {
        Self::DataDirUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid product error
    pub fn invalid_product(package: impl Into<String>) -> Self {
        Self::InvalidProduct {
            package: package.into(),
        }
    }

    /// Create an HTTPS-required error
    pub fn https_required(url: impl Into<String>) -> Self {
        Self::HttpsRequired { url: url.into() }
    }

    /// Create a credentials-required error
    pub fn credentials_required(host: impl Into<String>) -> Self {
        Self::CredentialsRequired { host: host.into() }
    }

    /// Create a fetch-failed error
    pub fn fetch_failed(reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            reason: reason.into(),
        }
    }

    /// Create an install-failed error
    pub fn install_failed(message: impl Into<String>) -> Self {
        Self::InstallFailed {
            message: message.into(),
        }
    }

    /// Create an uninstall-failed error
    pub fn uninstall_failed(message: impl Into<String>) -> Self {
        Self::UninstallFailed {
            message: message.into(),
        }
    }

    /// Create a no-provider error
    pub fn no_provider(package: impl Into<String>) -> Self {
        Self::NoProvider {
            package: package.into(),
        }
    }
}
