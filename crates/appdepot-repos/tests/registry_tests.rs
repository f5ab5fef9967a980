//! Cross-provider catalog: dedup precedence, install routing and the
//! startup sync policy

mod common;

use appdepot_core::host::PluginDescriptor;
use appdepot_core::progress::discard_progress;
use appdepot_core::StaticHost;
use appdepot_repos::provider::ProductProvider;
use appdepot_repos::registry::{ProviderRegistry, StartupAction};
use appdepot_repos::sync::CancelToken;
use appdepot_repos::{LogNotifier, Notifier, SideloadedProvider};
use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn registry_with(
    host: Arc<StaticHost>,
    notifier: Arc<dyn Notifier>,
    dir: &std::path::Path,
) -> ProviderRegistry {
    ProviderRegistry::new(host, settings_in(dir), notifier)
}

#[test]
fn test_dedup_first_registered_provider_wins() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let registry = registry_with(host.clone(), Arc::new(LogNotifier), dir.path());

    registry.register(Arc::new(StubProvider::from_lines(
        "first",
        &dir.path().join("first.inf"),
        &[full_line("com.x", 1), full_line("com.only-first", 1)],
        &*host,
    )));
    registry.register(Arc::new(StubProvider::from_lines(
        "second",
        &dir.path().join("second.inf"),
        &[full_line("com.x", 9), full_line("com.only-second", 1)],
        &*host,
    )));

    let products = registry.all_products();
    assert_eq!(products.len(), 3);
    let winner = products
        .iter()
        .find(|p| p.package_name == "com.x")
        .unwrap();
    assert_eq!(winner.revision, 1);

    // Output is sorted by package name
    let names: Vec<_> = products.iter().map(|p| p.package_name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn test_provider_resolution_prefers_origin_then_compatible() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let registry = registry_with(host.clone(), Arc::new(LogNotifier), dir.path());

    let first_index = dir.path().join("first.inf");
    let second_index = dir.path().join("second.inf");
    registry.register(Arc::new(StubProvider::from_lines(
        "first",
        &first_index,
        &[full_line("com.x", 1)],
        &*host,
    )));
    registry.register(Arc::new(StubProvider::from_lines(
        "second",
        &second_index,
        &[full_line("com.x", 9)],
        &*host,
    )));

    // A record originating from the second repository routes back to it
    let mut offered = record("com.x", 9, &*host);
    offered.repo_key = Some(second_index.to_string_lossy().to_string());
    assert_eq!(
        registry.provider_for_product(&offered).unwrap().name(),
        "second"
    );

    // Without an origin, the first compatible copy wins
    offered.repo_key = None;
    assert_eq!(
        registry.provider_for_product(&offered).unwrap().name(),
        "first"
    );

    // Unknown package resolves to nothing
    let ghost = record("com.ghost", 1, &*host);
    assert!(registry.provider_for_product(&ghost).is_none());
}

#[test]
fn test_incompatible_copy_falls_back_to_first_containing() {
    let dir = tempfile::tempdir().unwrap();
    // A host whose plugin API satisfies nothing
    let host = host_with(|state| {
        state.api = "com.atakmap.app.plugin-api-2.0".to_string();
    });
    let registry = registry_with(host.clone(), Arc::new(LogNotifier), dir.path());

    registry.register(Arc::new(StubProvider::from_lines(
        "only",
        &dir.path().join("only.inf"),
        &[full_line("com.x", 1)],
        &*host,
    )));

    let record = registry.product("com.x").unwrap();
    assert!(!record.is_compatible(&*host));
    // Still resolvable, the catalog just cannot vouch for compatibility
    assert_eq!(registry.provider_for_product(&record).unwrap().name(), "only");
}

#[tokio::test]
async fn test_install_of_unknown_package_toasts_and_errors() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = registry_with(host.clone(), notifier.clone(), dir.path());

    let record = record("com.nowhere", 1, &*host);
    let err = registry.install(&record).await.unwrap_err();
    assert!(err.to_string().contains("com.nowhere"));
    assert_eq!(notifier.toasts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_install_routes_and_marks_outstanding() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = registry_with(host.clone(), notifier.clone(), dir.path());

    registry.register(Arc::new(StubProvider::from_lines(
        "only",
        &dir.path().join("only.inf"),
        &[full_line("com.x", 2)],
        &*host,
    )));

    let record = registry.product("com.x").unwrap();
    registry.install(&record).await.unwrap();
    assert!(notifier.toasts.lock().unwrap().is_empty());

    // The observed install broadcast clears the outstanding mark
    host.set_installed("com.x", 2);
    registry.notify_installed("com.x");
}

#[test]
fn test_install_broadcast_adopts_only_unknown_plugins() {
    let dir = tempfile::tempdir().unwrap();
    let host = host_with(|state| {
        for pkg in ["com.known", "com.unknown"] {
            state.plugins.push(PluginDescriptor {
                package_name: pkg.to_string(),
                name: pkg.to_string(),
                version_name: None,
                version_code: 1,
                plugin_api: Some(HOST_API.to_string()),
            });
        }
    });
    let registry = registry_with(host.clone(), Arc::new(LogNotifier), dir.path());

    registry.register(Arc::new(StubProvider::from_lines(
        "catalog",
        &dir.path().join("catalog.inf"),
        &[full_line("com.known", 1)],
        &*host,
    )));
    let sideloaded = Arc::new(SideloadedProvider::new(dir.path(), host.clone()));
    registry.register(sideloaded.clone());

    // A cataloged plugin never grows a sideloaded stub
    host.set_installed("com.known", 1);
    registry.notify_installed("com.known");
    assert!(!sideloaded.contains("com.known"));

    // A plugin no catalog covers is adopted
    host.set_installed("com.unknown", 1);
    registry.notify_installed("com.unknown");
    assert!(sideloaded.contains("com.unknown"));
}

#[test]
fn test_update_notification_tracks_staleness() {
    let dir = tempfile::tempdir().unwrap();
    let host = host_with(|state| {
        state.installed.insert("com.x".to_string(), 1);
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = registry_with(host.clone(), notifier.clone(), dir.path());

    registry.register(Arc::new(StubProvider::from_lines(
        "only",
        &dir.path().join("only.inf"),
        &[full_line("com.x", 5)],
        &*host,
    )));

    assert!(registry.has_available_updates());
    registry.check_for_available_updates();
    assert_eq!(
        notifier.updates.lock().unwrap().last().unwrap(),
        &vec!["com.x".to_string()]
    );

    // Catching up clears the notification
    host.set_installed("com.x", 5);
    registry.check_for_available_updates();
    assert!(notifier.cleared.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_startup_syncs_on_first_run_then_stays_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let registry = registry_with(host.clone(), Arc::new(LogNotifier), dir.path());
    registry.register(Arc::new(StubProvider::from_lines(
        "only",
        &dir.path().join("only.inf"),
        &[full_line("com.x", 1)],
        &*host,
    )));

    let cancel = CancelToken::new();
    let action = registry.startup(&cancel, &discard_progress()).await.unwrap();
    assert!(matches!(action, StartupAction::Synced(_)));

    // Same host version, no startup-sync preference: nothing to do
    let again = registry.startup(&cancel, &discard_progress()).await.unwrap();
    assert!(matches!(again, StartupAction::UpToDate));
}

#[tokio::test]
async fn test_startup_syncs_again_after_host_upgrade() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let cancel = CancelToken::new();

    {
        let registry = registry_with(host.clone(), Arc::new(LogNotifier), dir.path());
        let action = registry.startup(&cancel, &discard_progress()).await.unwrap();
        assert!(matches!(action, StartupAction::Synced(_)));
    }

    // Host upgraded since the last sync
    let upgraded = host_with(|state| {
        state.version_code = 2;
    });
    let registry = registry_with(upgraded, Arc::new(LogNotifier), dir.path());
    let action = registry.startup(&cancel, &discard_progress()).await.unwrap();
    assert!(matches!(action, StartupAction::Synced(_)));
}

#[tokio::test]
async fn test_startup_reports_incompatible_plugins() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let cancel = CancelToken::new();

    {
        let registry = registry_with(host.clone(), Arc::new(LogNotifier), dir.path());
        registry.startup(&cancel, &discard_progress()).await.unwrap();
    }

    let broken = host_with(|state| {
        state
            .loaded_incompatible
            .push("com.plugin.broken".to_string());
    });
    let registry = registry_with(broken, Arc::new(LogNotifier), dir.path());
    let action = registry.startup(&cancel, &discard_progress()).await.unwrap();
    match action {
        StartupAction::IncompatiblePlugins(plugins) => {
            assert_eq!(plugins, vec!["com.plugin.broken".to_string()]);
        }
        other => panic!("expected incompatible plugins, got {:?}", other),
    }
}

#[test]
fn test_invalid_record_is_skipped_without_sinking_its_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let registry = registry_with(host.clone(), Arc::new(LogNotifier), dir.path());

    // Build a repository then corrupt one record in memory
    let mut bad = record("com.bad", 1, &*host);
    bad.simple_name = String::new();
    let repo = appdepot_repos::Repository::with_products(
        dir.path().join("mixed.inf"),
        appdepot_repos::RepositoryType::Remote,
        vec![bad, record("com.survivor", 1, &*host)],
    );
    registry.register(Arc::new(StubProvider::new("mixed", Some(repo))));
    registry.register(Arc::new(StubProvider::from_lines(
        "good",
        &dir.path().join("good.inf"),
        &[full_line("com.good", 1)],
        &*host,
    )));

    let products = registry.all_products();
    let names: Vec<_> = products.iter().map(|p| p.package_name.as_str()).collect();
    assert_eq!(names, vec!["com.good", "com.survivor"]);
}
