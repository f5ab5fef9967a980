//! Index parsing, serialization and reconciliation against a live host

mod common;

use appdepot_repos::repository::{Repository, RepositoryType};
use common::*;

#[test]
fn test_index_round_trip_preserves_packages_and_revisions() {
    let host = host();
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("product.inf");

    write_index(
        &index,
        &[
            full_line("com.example.alpha", 3),
            full_line("com.example.beta", 7),
        ],
    );

    let repo = Repository::load(&index, RepositoryType::Remote, &*host)
        .unwrap()
        .unwrap();
    let rewritten = dir.path().join("rewritten.inf");
    Repository::with_products(&rewritten, RepositoryType::Remote, repo.products().to_vec())
        .save()
        .unwrap();

    let reparsed = Repository::load(&rewritten, RepositoryType::Remote, &*host)
        .unwrap()
        .unwrap();
    assert_eq!(reparsed.len(), 2);
    assert_eq!(reparsed.product("com.example.alpha").unwrap().revision, 3);
    assert_eq!(reparsed.product("com.example.beta").unwrap().revision, 7);
}

#[test]
fn test_comma_in_field_survives_as_space() {
    let host = host();
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("product.inf");

    let mut record = record("com.example.alpha", 1, &*host);
    record.description = Some("maps, routes, tracks".to_string());
    Repository::with_products(&index, RepositoryType::Remote, vec![record])
        .save()
        .unwrap();

    let reparsed = Repository::load(&index, RepositoryType::Remote, &*host)
        .unwrap()
        .unwrap();
    assert_eq!(reparsed.len(), 1);
    assert_eq!(
        reparsed
            .product("com.example.alpha")
            .unwrap()
            .description
            .as_deref(),
        Some("maps  routes  tracks")
    );
}

#[test]
fn test_mixed_formats_and_garbage_in_one_index() {
    let host = host();
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("product.inf");

    write_index(
        &index,
        &[
            "# products".to_string(),
            "com.example.stub,Stub,2,plugins/stub.apk".to_string(),
            full_line("com.example.full", 4),
            "Windows,plugin,com.example.win,Win,1.0,1,a,b,c,d,21,api,1".to_string(),
            "way,too,short".to_string(),
        ],
    );

    let repo = Repository::load(&index, RepositoryType::FileSystem, &*host)
        .unwrap()
        .unwrap();
    assert_eq!(repo.len(), 2);
    assert_eq!(repo.product("com.example.stub").unwrap().revision, 2);
    assert!(repo.has_product("com.example.full"));
    assert!(!repo.has_product("com.example.win"));
    assert!(repo.is_valid(&*host));
}

#[test]
fn test_missing_index_is_none_empty_index_is_valid() {
    let host = host();
    let dir = tempfile::tempdir().unwrap();

    let missing = Repository::load(
        &dir.path().join("absent.inf"),
        RepositoryType::FileSystem,
        &*host,
    )
    .unwrap();
    assert!(missing.is_none());

    let empty_path = dir.path().join("custom.inf");
    std::fs::write(&empty_path, "# empty custom repository\n").unwrap();
    let empty = Repository::load(&empty_path, RepositoryType::FileSystem, &*host)
        .unwrap()
        .unwrap();
    assert!(empty.is_empty());
    assert!(empty.is_valid(&*host));
}

#[test]
fn test_staleness_against_live_install_state() {
    let host = host_with(|state| {
        state.installed.insert("com.example.behind".to_string(), 2);
        state.installed.insert("com.example.even".to_string(), 5);
    });
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("product.inf");

    write_index(
        &index,
        &[
            full_line("com.example.behind", 5),
            full_line("com.example.even", 5),
            full_line("com.example.notinstalled", 5),
        ],
    );

    let repo = Repository::load(&index, RepositoryType::Remote, &*host)
        .unwrap()
        .unwrap();
    let stale: Vec<_> = repo
        .stale_products(&*host)
        .into_iter()
        .map(|p| p.package_name.as_str().to_string())
        .collect();
    assert_eq!(stale, vec!["com.example.behind".to_string()]);
}

#[test]
fn test_parse_annotates_installed_version_live() {
    let host = host_with(|state| {
        state.installed.insert("com.example.alpha".to_string(), 9);
    });
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("product.inf");
    write_index(&index, &[full_line("com.example.alpha", 9)]);

    let repo = Repository::load(&index, RepositoryType::Remote, &*host)
        .unwrap()
        .unwrap();
    let record = repo.product("com.example.alpha").unwrap();
    assert!(record.is_installed());
    assert_eq!(record.installed_version, 9);
    assert_eq!(record.repo_key.as_deref(), Some(repo.repo_key().as_str()));
}

#[test]
fn test_install_uninstall_reconciliation_cycle() {
    let host = host();
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("product.inf");
    write_index(&index, &[full_line("com.example.alpha", 4)]);

    let mut repo = Repository::load(&index, RepositoryType::Remote, &*host)
        .unwrap()
        .unwrap();

    host.set_installed("com.example.alpha", 4);
    assert!(repo.installed("com.example.alpha", &*host));
    assert!(!repo.installed("com.example.alpha", &*host));

    host.set_uninstalled("com.example.alpha");
    assert!(repo.uninstalled("com.example.alpha"));
    assert!(!repo.product("com.example.alpha").unwrap().is_installed());
}
