//! Unit tests for configuration and root folder resolution
//!
//! Tests that manipulate DLENS_ROOT_FOLDER are marked with #[serial]
//! so they run sequentially, not in parallel.

use dlens_common::config::{
    load_toml_config, ObjectStoreKind, RootFolderInitializer, RootFolderResolver, TomlConfig,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_defaults() {
    let config = TomlConfig::default();
    assert_eq!(config.port, 5740);
    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.fetch_timeout_secs, 30);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.object_store.kind, ObjectStoreKind::Fs);
    assert!(config.root_folder.is_none());
}

#[test]
fn test_missing_toml_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_partial_toml_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dlens-ds.toml");
    std::fs::write(
        &path,
        r#"
port = 6000

[object_store]
kind = "http"
endpoint = "http://localhost:9000"
bucket = "defects"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap().unwrap();
    assert_eq!(config.port, 6000);
    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.object_store.kind, ObjectStoreKind::Http);
    assert_eq!(config.object_store.bucket.as_deref(), Some("defects"));
    assert!(config.object_store.token.is_none());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, dlens_common::Error::Config(_)));
}

#[test]
#[serial]
fn test_cli_arg_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/dlens-env-root");

    let root = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/dlens-cli-root")))
        .with_toml_root(Some(PathBuf::from("/tmp/dlens-toml-root")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/dlens-cli-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/dlens-env-root");

    let root = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/dlens-toml-root")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/dlens-env-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_root_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/dlens-toml-root")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/dlens-toml-root"));

    let fallback = RootFolderResolver::new("test-module").resolve();
    assert!(!fallback.as_os_str().is_empty());
}

#[test]
fn test_initializer_creates_folder() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join("dlens.db"));
    assert_eq!(initializer.objects_path(), root.join("objects"));
}
