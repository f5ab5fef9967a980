//! Artifact downloads
//!
//! Streams a product artifact from the update server to the download
//! directory, verifies its content hash when the record carries one, and
//! hands the file to the OS package host. One download at a time; a second
//! request while one is in flight is rejected, not queued.

use anyhow::{Context, Result};
use appdepot_core::hashing::verify_content_integrity;
use appdepot_core::{Error, PackageHost, ProductRecord, ProgressFn, ProgressUpdate};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

pub struct DownloadManager {
    client: reqwest::Client,
    download_dir: PathBuf,
    host: Arc<dyn PackageHost>,
    busy: Mutex<()>,
}

impl DownloadManager {
    pub fn new(download_dir: impl Into<PathBuf>, host: Arc<dyn PackageHost>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            download_dir: download_dir.into(),
            host,
            busy: Mutex::new(()),
        })
    }

    /// Download the artifact for `record` from `url` and request its
    /// install. Rejects with `DownloadInProgress` when another download
    /// holds the slot.
    pub async fn download_and_install(
        &self,
        record: &ProductRecord,
        url: &Url,
        progress: &ProgressFn<'_>,
    ) -> Result<()> {
        let _slot = self
            .busy
            .try_lock()
            .map_err(|_| Error::DownloadInProgress)?;

        info!("Downloading {} from {}", record.package_name, url);
        progress(ProgressUpdate::new(
            0,
            format!("Downloading {}", record.simple_name),
        ));

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("server rejected download")?;

        let expected_len = response.content_length().or_else(|| {
            if record.has_file_size() {
                Some(record.file_size as u64)
            } else {
                None
            }
        });

        std::fs::create_dir_all(&self.download_dir)?;
        let file_name = url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|n| !n.is_empty())
            .unwrap_or("product.apk")
            .to_string();
        let target = self.download_dir.join(&file_name);

        let mut out = std::fs::File::create(&target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        let mut received: u64 = 0;
        let mut body = response;
        while let Some(chunk) = body.chunk().await.context("download interrupted")? {
            out.write_all(&chunk)?;
            received += chunk.len() as u64;
            if let Some(total) = expected_len.filter(|t| *t > 0) {
                let percent = ((received.min(total)) * 100 / total) as u8;
                progress(ProgressUpdate::new(
                    percent,
                    format!("Downloading {}", record.simple_name),
                ));
            }
        }
        out.flush()?;
        debug!("Wrote {} bytes to {}", received, target.display());

        let content = std::fs::read(&target)?;
        verify_content_integrity(&content, &file_name, record.hash.as_deref())?;

        progress(ProgressUpdate::new(
            100,
            format!("Installing {}", record.simple_name),
        ));
        self.host
            .request_install(&target)
            .with_context(|| format!("failed to install {}", record.package_name))
    }
}
