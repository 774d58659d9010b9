// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the chatfleet configuration system.

use chatfleet_config::diagnostic::ConfigError;
use chatfleet_config::model::FleetConfig;
use chatfleet_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_fleet_config() {
    let toml = r#"
[service]
name = "fleet-a"
log_level = "debug"

[storage]
database_path = "/tmp/fleet.db"
wal_mode = false

[session]
restore_on_start = false
reconnect_max_attempts = 2

[sync]
group_batch_size = 20
interval_secs = 3600

[media]
temp_dir = "/tmp/fleet-media"

[bridge]
url = "ws://10.0.0.5:9000/bridge"
request_timeout_secs = 5

[notify]
capacity = 64
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "fleet-a");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/fleet.db");
    assert!(!config.storage.wal_mode);
    assert!(!config.session.restore_on_start);
    assert!(config.session.reconnect);
    assert_eq!(config.session.reconnect_max_attempts, 2);
    assert_eq!(config.sync.group_batch_size, 20);
    assert_eq!(config.sync.interval_secs, Some(3600));
    assert_eq!(config.media.temp_dir.as_deref(), Some("/tmp/fleet-media"));
    assert_eq!(config.bridge.url, "ws://10.0.0.5:9000/bridge");
    assert_eq!(config.bridge.request_timeout_secs, 5);
    assert_eq!(config.notify.capacity, 64);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    let defaults = FleetConfig::default();
    assert_eq!(config.service.name, "chatfleet");
    assert_eq!(config.sync.group_batch_size, defaults.sync.group_batch_size);
    assert_eq!(config.sync.interval_secs, None);
    assert!(config.storage.wal_mode);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[sync]
group_bach_size = 10
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "group_bach_size");
            assert_eq!(suggestion.as_deref(), Some("group_batch_size"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[sync]
group_batch_size = "many"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject string batch size");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. })),
        "got {errors:?}"
    );
}

#[test]
fn validation_runs_after_parse() {
    let toml = r#"
[sync]
group_batch_size = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("zero batch size is invalid");
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatfleet.toml");
    std::fs::write(&path, "[notify]\ncapacity = 8\n").unwrap();

    let config = load_and_validate_path(&path).expect("file should load");
    assert_eq!(config.notify.capacity, 8);
}

#[test]
fn unknown_key_in_file_points_at_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatfleet.toml");
    std::fs::write(&path, "[bridge]\nurl = \"ws://x\"\nrequest_timeout = 3\n").unwrap();

    let errors = load_and_validate_path(&path).expect_err("typo should be rejected");
    match &errors[0] {
        ConfigError::UnknownKey {
            section,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(section, "bridge");
            assert_eq!(suggestion.as_deref(), Some("request_timeout_secs"));
            assert!(span.is_some());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}
