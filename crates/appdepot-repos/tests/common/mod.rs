//! Shared fixtures for the provider and registry tests
#![allow(dead_code)]

use anyhow::Result;
use appdepot_core::host::{HostState, StaticHost};
use appdepot_core::settings::Settings;
use appdepot_core::{PackageHost, ProductRecord, ProgressFn, SharedSettings};
use appdepot_repos::provider::ProductProvider;
use appdepot_repos::registry::Notifier;
use appdepot_repos::repository::{Repository, RepositoryType};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const HOST_API: &str = "com.atakmap.app.plugin-api-1.0";

pub fn host() -> Arc<StaticHost> {
    Arc::new(StaticHost::new(HostState::default()))
}

pub fn host_with(configure: impl FnOnce(&mut HostState)) -> Arc<StaticHost> {
    let mut state = HostState::default();
    configure(&mut state);
    Arc::new(StaticHost::new(state))
}

pub fn settings_in(dir: &Path) -> SharedSettings {
    Settings::in_dir(dir).unwrap().into_shared()
}

/// Full-format index line for a plugin compatible with the default host
pub fn full_line(pkg: &str, revision: i32) -> String {
    format!(
        "Android,plugin,{pkg},Example {pkg},1.0,{revision},https://repo.example.com/{pkg}.apk,https://repo.example.com/{pkg}.png,A tool,abc123,21,{HOST_API},2048"
    )
}

pub fn write_index(path: &Path, lines: &[String]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, lines.join("\n") + "\n").unwrap();
}

pub fn record(pkg: &str, revision: i32, host: &dyn PackageHost) -> ProductRecord {
    ProductRecord::from_index_line(&full_line(pkg, revision), None, host).unwrap()
}

/// Write an artifact with the sidecar metadata `StaticHost` understands
pub fn write_artifact(dir: &Path, pkg: &str, version_code: i32, plugin: bool) -> PathBuf {
    let apk = dir.join(format!("{pkg}.apk"));
    std::fs::write(&apk, format!("artifact bytes for {pkg}")).unwrap();
    let plugin_api = if plugin {
        format!(r#","plugin_api":"{HOST_API}""#)
    } else {
        String::new()
    };
    std::fs::write(
        dir.join(format!("{pkg}.apk.json")),
        format!(
            r#"{{"package_name":"{pkg}","version_name":"1.0","version_code":{version_code},"label":"Example {pkg}","description":"A tool"{plugin_api}}}"#
        ),
    )
    .unwrap();
    apk
}

/// Notifier that records everything it is told
#[derive(Default)]
pub struct RecordingNotifier {
    pub updates: Mutex<Vec<Vec<String>>>,
    pub cleared: AtomicUsize,
    pub toasts: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn updates_available(&self, packages: &[String]) {
        self.updates.lock().unwrap().push(packages.to_vec());
    }

    fn clear_updates(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }

    fn toast(&self, message: &str) {
        self.toasts.lock().unwrap().push(message.to_string());
    }
}

/// Provider serving a fixed repository, with an optional rebuild delay
pub struct StubProvider {
    pub name: &'static str,
    pub repo: Mutex<Option<Repository>>,
    pub rebuilds: AtomicUsize,
    pub delay: Duration,
    pub needs_credentials: bool,
}

impl StubProvider {
    pub fn new(name: &'static str, repo: Option<Repository>) -> Self {
        Self {
            name,
            repo: Mutex::new(repo),
            rebuilds: AtomicUsize::new(0),
            delay: Duration::ZERO,
            needs_credentials: false,
        }
    }

    pub fn with_delay(name: &'static str, repo: Option<Repository>, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(name, repo)
        }
    }

    pub fn from_lines(
        name: &'static str,
        index_path: &Path,
        lines: &[String],
        host: &dyn PackageHost,
    ) -> Self {
        let text = lines.join("\n");
        let repo = Repository::parse_reader(
            text.as_bytes(),
            index_path,
            RepositoryType::Remote,
            host,
        )
        .unwrap();
        Self::new(name, Some(repo))
    }
}

#[async_trait]
impl ProductProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn repository(&self) -> Option<Repository> {
        self.repo.lock().unwrap().clone()
    }

    async fn rebuild(&self, progress: &ProgressFn) -> Option<Repository> {
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        progress(appdepot_core::ProgressUpdate::new(50, "rebuilding"));
        progress(appdepot_core::ProgressUpdate::new(100, "done"));
        self.repository()
    }

    fn installed(&self, _package: &str) -> bool {
        false
    }

    fn uninstalled(&self, _package: &str) -> bool {
        false
    }

    async fn install(&self, _record: &ProductRecord) -> Result<()> {
        Ok(())
    }

    async fn uninstall(&self, _record: &ProductRecord) -> Result<()> {
        Ok(())
    }

    fn needs_credentials(&self) -> bool {
        self.needs_credentials
    }
}
