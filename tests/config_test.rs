//! Configuration file loading tests.

use std::io::Write;
use std::path::PathBuf;

use tracing::Level;

use switchboard::config::AppConfig;

/// Helper to get the path to test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn test_valid_config_loads() {
    let config =
        AppConfig::load(&fixtures_dir().join("config.json")).expect("Failed to load config");

    assert_eq!(config.level().unwrap(), Level::DEBUG);
    assert_eq!(config.audit.queue_capacity, 64);
    assert_eq!(config.routing.rng_seed, Some(20231114));
}

#[test]
fn test_invalid_config_rejected() {
    let err = AppConfig::load(&fixtures_dir().join("invalid_config.json")).unwrap_err();
    assert!(err.to_string().contains("configuration error"));
}

#[test]
fn test_config_file_not_found() {
    let err = AppConfig::load(&fixtures_dir().join("nonexistent.json")).unwrap_err();
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn test_missing_sections_take_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "routing": {{ "rng_seed": 1 }} }}"#).unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.log_level, "info");
    assert_eq!(config.audit.queue_capacity, 1024);
    assert_eq!(config.routing.rng_seed, Some(1));
}

#[test]
fn test_malformed_json_is_a_json_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let err = AppConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, switchboard::SwitchboardError::Json(_)));
}
