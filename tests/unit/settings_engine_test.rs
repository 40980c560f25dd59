//! Integration-level unit tests for the SettingsEngine public API.
//!
//! These tests exercise the SettingsEngine through its public trait interface,
//! validating default loading, value persistence, and reset behavior.

use smart_bookmarks::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use smart_bookmarks::types::errors::SettingsError;
use smart_bookmarks::types::settings::{SyncSettings, DEFAULT_CHANNEL_NAME};
use tempfile::TempDir;

/// Helper: create a SettingsEngine backed by a temp directory that lives for the
/// duration of the test (the caller holds the `TempDir` handle).
fn engine_in_temp(dir: &TempDir) -> SettingsEngine {
    let path = dir
        .path()
        .join("settings.json")
        .to_string_lossy()
        .to_string();
    SettingsEngine::new(Some(path))
}

/// When no config file exists on disk, `load()` returns the built-in defaults.
#[test]
fn test_load_defaults_when_no_config_file_exists() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();

    assert_eq!(settings, SyncSettings::default());
    assert_eq!(settings.broadcast.channel_name, DEFAULT_CHANNEL_NAME);
    assert!(settings.broadcast.prefer_broadcast_channel);
    assert!(settings.remote.atomic_increment);
    assert_eq!(settings.metadata.timeout_secs, 10);
}

/// A change made through `set_value` is visible to a fresh engine on the same file.
#[test]
fn test_set_value_persists_changes() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine
            .set_value(
                "broadcast.channel_name",
                serde_json::Value::String("team-bookmarks".to_string()),
            )
            .unwrap();
    }

    {
        let mut engine2 = engine_in_temp(&dir);
        let loaded = engine2.load().unwrap();
        assert_eq!(
            loaded.broadcast.channel_name, "team-bookmarks",
            "set_value must persist the change so a new engine instance reads it back"
        );
    }
}

/// `reset()` restores defaults in memory and on disk.
#[test]
fn test_reset_restores_defaults() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();

        engine
            .set_value("remote.atomic_increment", serde_json::json!(false))
            .unwrap();
        engine
            .set_value("metadata.timeout_secs", serde_json::json!(3))
            .unwrap();
        assert!(!engine.get_settings().remote.atomic_increment);
        assert_eq!(engine.get_settings().metadata.timeout_secs, 3);

        engine.reset().unwrap();

        assert_eq!(*engine.get_settings(), SyncSettings::default());
    }

    {
        let mut engine2 = engine_in_temp(&dir);
        let loaded = engine2.load().unwrap();
        assert_eq!(loaded, SyncSettings::default());
    }
}

/// Unknown keys are rejected without touching the stored settings.
#[test]
fn test_set_value_unknown_key() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let missing_leaf = engine.set_value("broadcast.no_such_field", serde_json::json!(1));
    assert!(matches!(missing_leaf, Err(SettingsError::InvalidKey(_))));

    let missing_section = engine.set_value("nope.channel_name", serde_json::json!("x"));
    assert!(matches!(missing_section, Err(SettingsError::InvalidKey(_))));

    let empty = engine.set_value("", serde_json::json!("x"));
    assert!(matches!(empty, Err(SettingsError::InvalidKey(_))));

    assert_eq!(*engine.get_settings(), SyncSettings::default());
}

/// A value of the wrong type is rejected and nothing is written.
#[test]
fn test_set_value_wrong_type() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let result = engine.set_value("metadata.timeout_secs", serde_json::json!("ten"));

    assert!(matches!(result, Err(SettingsError::InvalidValue(_))));
    assert_eq!(engine.get_settings().metadata.timeout_secs, 10);
    assert!(!dir.path().join("settings.json").exists());
}

/// A malformed config file is an error rather than silently replaced.
#[test]
fn test_load_malformed_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
    let mut engine = engine_in_temp(&dir);

    let result = engine.load();

    assert!(matches!(result, Err(SettingsError::SerializationError(_))));
}

/// `save()` creates missing parent directories.
#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("settings.json");
    let engine = SettingsEngine::new(Some(path.to_string_lossy().to_string()));

    engine.save().unwrap();

    assert!(path.exists());
}
