//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use classic_protocol::config::{ProtocolConfig, MAX_MAP_VOLUME};
use classic_protocol::error::ProtocolError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = ProtocolConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_username_limits() {
    let mut config = ProtocolConfig::default();
    config.client.username = String::new();
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Username cannot be empty")));

    config.client.username = "a".repeat(17);
    assert!(config.validate().iter().any(|e| e.contains("too long")));

    config.client.username = "a".repeat(16);
    assert!(config.validate().is_empty());
}

#[test]
fn test_verification_key_fits_string_field() {
    let mut config = ProtocolConfig::default();
    config.client.verification_key = "k".repeat(65);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Verification key")));
}

#[test]
fn test_invalid_server_address() {
    let mut config = ProtocolConfig::default();
    config.transport.address = "not-an-address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_connection_timeout_bounds() {
    let mut config = ProtocolConfig::default();
    config.transport.connection_timeout = Duration::from_millis(50);
    assert!(config.validate().iter().any(|e| e.contains("too short")));

    config.transport.connection_timeout = Duration::from_secs(301);
    assert!(config.validate().iter().any(|e| e.contains("too long")));
}

#[test]
fn test_read_buffer_must_hold_bulk_update() {
    let mut config = ProtocolConfig::default();
    config.transport.read_buffer_capacity = 1024;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Read buffer capacity")));
}

#[test]
fn test_map_volume_limits() {
    let mut config = ProtocolConfig::default();
    config.protocol.max_map_volume = 0;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("cannot be 0")));

    config.protocol.max_map_volume = MAX_MAP_VOLUME;
    assert!(config.validate().is_empty());
}

#[test]
fn test_custom_blocks_without_cpe() {
    let config = ProtocolConfig::default_with_overrides(|c| c.protocol.use_cpe = false);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("allow_custom_blocks")));
}

#[test]
fn test_logging_needs_an_output() {
    let mut config = ProtocolConfig::default();
    config.logging.log_to_console = false;
    config.logging.log_to_file = false;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("At least one logging output")));

    config.logging.log_to_file = true;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_validate_strict_collects_errors() {
    let mut config = ProtocolConfig::default();
    config.client.username = String::new();
    config.transport.address = String::new();

    match config.validate_strict() {
        Err(ProtocolError::ConfigError(message)) => {
            assert!(message.contains("Username cannot be empty"));
            assert!(message.contains("Server address cannot be empty"));
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_toml_roundtrip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");

    let config = ProtocolConfig::default_with_overrides(|c| {
        c.client.username = "Builder".to_string();
        c.protocol.strict_framing = true;
        c.transport.connection_timeout = Duration::from_millis(2500);
        c.logging.log_level = Level::DEBUG;
    });
    config.save_to_file(&path).unwrap();

    let loaded = ProtocolConfig::from_file(&path).unwrap();
    assert_eq!(loaded.client.username, "Builder");
    assert!(loaded.protocol.strict_framing);
    assert_eq!(loaded.transport.connection_timeout, Duration::from_millis(2500));
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let toml = r#"
        [client]
        username = "Alice"
        verification_key = "0123abcd"
        app_name = "test client"
    "#;
    let config = ProtocolConfig::from_toml(toml).unwrap();
    assert_eq!(config.client.username, "Alice");
    assert!(config.protocol.use_cpe);
    assert_eq!(config.transport.address, "127.0.0.1:25565");
}

#[test]
fn test_bad_toml_is_config_error() {
    let result = ProtocolConfig::from_toml("[client\nusername = 1");
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ProtocolConfig::from_file(dir.path().join("missing.toml"));
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
fn test_example_config_parses() {
    let example = ProtocolConfig::example_config();
    assert!(example.contains("[client]"));
    assert!(ProtocolConfig::from_toml(&example).is_ok());
}
