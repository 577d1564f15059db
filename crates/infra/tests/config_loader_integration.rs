//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::path::PathBuf;

use relayq_domain::{QueueError, StorageBackend};
use relayq_infra::config;

fn write_config(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_config_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "relayq.json",
        r#"{
            "queue": {
                "max_retry_count": 5,
                "storage_key": "chat_outbox",
                "executor_timeout_ms": null
            },
            "storage": { "backend": "sqlite", "path": "/tmp/relayq.db" }
        }"#,
    );

    let config = config::load_from_file(Some(path)).unwrap();

    assert_eq!(config.queue.max_retry_count, 5);
    assert_eq!(config.queue.storage_key, "chat_outbox");
    assert_eq!(config.queue.executor_timeout_ms, None);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "relayq.toml",
        r#"
[queue]
max_retry_count = 2

[storage]
backend = "memory"
"#,
    );

    let config = config::load_from_file(Some(path)).unwrap();

    assert_eq!(config.queue.max_retry_count, 2);
    assert_eq!(config.queue.executor_timeout_ms, Some(30_000));
    assert_eq!(config.storage.backend, StorageBackend::Memory);
}

#[test]
fn test_load_config_with_minimal_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "config.json", "{}");

    let config = config::load_from_file(Some(path)).unwrap();

    assert_eq!(config, relayq_domain::AppConfig::default());
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "config.json", r#"{ "queue": { "max_retry_count": 0 } }"#);

    assert!(matches!(config::load_from_file(Some(path)), Err(QueueError::Config(_))));
}

#[test]
fn test_missing_file_is_a_config_error() {
    let result = config::load_from_file(Some(PathBuf::from("/nonexistent/relayq.toml")));
    assert!(matches!(result, Err(QueueError::Config(_))));
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "relayq.toml", "[queue\nmax_retry_count = ");

    let err = config::load_from_file(Some(path)).unwrap_err();
    assert!(err.to_string().contains("Invalid TOML format"));
}
