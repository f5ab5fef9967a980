//! Remote index fetching
//!
//! Pulls the compressed index bundle from the update server and unpacks it
//! into the local cache. The outcome is tri-state: fetched, authentication
//! required, or failed with a reason. Credentials come from a pluggable
//! store keyed by server host.

use crate::bundle::extract_bundle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of a remote index fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// Bundle fetched and extracted; paths of the extracted files
    Fetched(Vec<PathBuf>),
    /// Server demands credentials we do not have (or rejected the ones we
    /// sent)
    AuthRequired,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Source of per-server credentials
pub trait CredentialStore: Send + Sync {
    fn credentials_for(&self, host: &str) -> Option<Credentials>;
}

/// Store with no credentials at all
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn credentials_for(&self, _host: &str) -> Option<Credentials> {
        None
    }
}

#[async_trait]
pub trait IndexFetcher: Send + Sync {
    /// Fetch the index bundle at `url` and extract it into `dest_dir`
    async fn fetch_index(&self, url: &Url, dest_dir: &Path) -> FetchOutcome;
}

/// HTTP fetcher backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
    credentials: Box<dyn CredentialStore>,
}

impl HttpFetcher {
    pub fn new(credentials: Box<dyn CredentialStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            credentials,
        })
    }

    async fn fetch_inner(&self, url: &Url, dest_dir: &Path) -> Result<FetchOutcome> {
        let mut request = self.client.get(url.clone());
        if let Some(host) = url.host_str() {
            if let Some(creds) = self.credentials.credentials_for(host) {
                debug!("Using stored credentials for {}", host);
                request = request.basic_auth(creds.username, Some(creds.password));
            }
        }

        let response = request.send().await.context("request failed")?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
                return Ok(FetchOutcome::AuthRequired);
            }
            status if !status.is_success() => {
                return Ok(FetchOutcome::Failed(format!("HTTP {}", status.as_u16())));
            }
            _ => {}
        }

        let bytes = response.bytes().await.context("failed to read body")?;
        std::fs::create_dir_all(dest_dir)?;
        let archive = dest_dir.join(bundle_file_name(url));
        std::fs::write(&archive, &bytes)
            .with_context(|| format!("failed to write {}", archive.display()))?;

        let extracted = extract_bundle(&archive, dest_dir)?;
        Ok(FetchOutcome::Fetched(extracted))
    }
}

/// File name under which the fetched bundle is cached
fn bundle_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("product.infz")
        .to_string()
}

#[async_trait]
impl IndexFetcher for HttpFetcher {
    async fn fetch_index(&self, url: &Url, dest_dir: &Path) -> FetchOutcome {
        match self.fetch_inner(url, dest_dir).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Index fetch from {} failed: {:#}", url, e);
                FetchOutcome::Failed(format!("{:#}", e))
            }
        }
    }
}
