//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use openwebnet::config::{GatewayConfig, DEFAULT_GATEWAY_PORT, DEFAULT_SERIAL_BAUD_RATE};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = GatewayConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.bus.port, DEFAULT_GATEWAY_PORT);
    assert_eq!(config.usb.baud_rate, DEFAULT_SERIAL_BAUD_RATE);
}

#[test]
fn test_empty_gateway_host() {
    let mut config = GatewayConfig::default();
    config.bus.host = "  ".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("host cannot be empty")));
}

#[test]
fn test_zero_gateway_port() {
    let mut config = GatewayConfig::default();
    config.bus.port = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("port must be greater than 0")));
}

#[test]
fn test_password_rules() {
    let mut config = GatewayConfig::default();
    config.bus.password = String::new();
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("password cannot be empty")));

    config.bus.password = "abc 123".to_string();
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("must be alphanumeric")));

    // HMAC passwords are alphanumeric but not numeric
    config.bus.password = "Secret42".to_string();
    assert!(config.validate().is_empty());
}

#[test]
fn test_empty_serial_port() {
    let mut config = GatewayConfig::default();
    config.usb.port_name = String::new();
    config.usb.baud_rate = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Serial port name")));
    assert!(errors.iter().any(|e| e.contains("baud rate")));
}

#[test]
fn test_short_connect_timeout() {
    let mut config = GatewayConfig::default();
    config.timing.connect_timeout = Duration::from_millis(50);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Connect timeout too short")));
}

#[test]
fn test_long_connect_timeout() {
    let mut config = GatewayConfig::default();
    config.timing.connect_timeout = Duration::from_secs(600);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Connect timeout too long")));
}

#[test]
fn test_keepalive_must_precede_monitor_timeout() {
    let mut config = GatewayConfig::default();
    config.timing.keepalive_interval = Duration::from_secs(120);
    config.timing.mon_read_timeout = Duration::from_secs(120);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("must be shorter than the monitor read timeout")));
}

#[test]
fn test_zero_fresh_window() {
    let mut config = GatewayConfig::default();
    config.timing.cmd_fresh_window = Duration::ZERO;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("freshness window")));
}

#[test]
fn test_reconnect_delays() {
    let mut config = GatewayConfig::default();
    config.reconnect.initial_delay = Duration::from_secs(10);
    config.reconnect.max_delay = Duration::from_secs(5);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("cannot be smaller than the initial delay")));

    config.reconnect.initial_delay = Duration::ZERO;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("initial delay must be greater than 0")));
}

#[test]
fn test_event_queue_capacity() {
    let mut config = GatewayConfig::default();
    config.events.queue_capacity = 0;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Event queue capacity must be greater than 0")));

    config.events.queue_capacity = 2_000_000;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Event queue capacity too large")));
}

#[test]
fn test_empty_app_name() {
    let mut config = GatewayConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = GatewayConfig::default();
    config.logging.app_name = "a".repeat(65);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Application name too long")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    let config = GatewayConfig::default();
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = GatewayConfig::default();
    config.bus.port = 0;
    config.bus.host = String::new();

    let err = config.validate_strict().unwrap_err().to_string();
    assert!(err.contains("Configuration validation failed"));
    assert!(err.contains("host cannot be empty"));
    assert!(err.contains("port must be greater than 0"));
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = GatewayConfig::default();
    config.bus.password = String::new();
    config.usb.port_name = String::new();
    config.timing.cmd_read_timeout = Duration::from_millis(1);
    config.events.queue_capacity = 0;

    let errors = config.validate();
    assert!(
        errors.len() >= 4,
        "Expected at least 4 errors, got {}: {:?}",
        errors.len(),
        errors
    );
}

// ============================================================================
// TOML
// ============================================================================

#[test]
fn test_partial_toml_fills_defaults() {
    let config = GatewayConfig::from_toml(
        r#"
        [bus]
        host = "192.168.1.35"
        port = 20000
        password = "abcde12345"

        [reconnect]
        auto_reconnect = false
        initial_delay = 1000
        max_delay = 8000
        "#,
    )
    .expect("valid TOML");

    assert_eq!(config.bus.host, "192.168.1.35");
    assert_eq!(config.bus.password, "abcde12345");
    assert!(!config.reconnect.auto_reconnect);
    assert_eq!(config.reconnect.initial_delay, Duration::from_millis(1000));
    assert_eq!(config.reconnect.max_delay, Duration::from_secs(8));
    assert_eq!(config.usb.baud_rate, DEFAULT_SERIAL_BAUD_RATE);
    assert_eq!(config.logging.log_level, Level::INFO);
    assert!(config.validate().is_empty());
}

#[test]
fn test_toml_log_level() {
    let config = GatewayConfig::from_toml(
        r#"
        [logging]
        app_name = "gw"
        log_level = "debug"
        with_target = false
        json_format = true
        "#,
    )
    .expect("valid TOML");
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);

    let err = GatewayConfig::from_toml(
        r#"
        [logging]
        app_name = "gw"
        log_level = "loud"
        with_target = false
        json_format = false
        "#,
    );
    assert!(err.is_err());
}

#[test]
fn test_example_config_parses_back() {
    let example = GatewayConfig::example_config();
    let parsed = GatewayConfig::from_toml(&example).expect("example config parses");
    assert_eq!(parsed.bus.port, DEFAULT_GATEWAY_PORT);
    assert_eq!(parsed.timing.cmd_fresh_window, Duration::from_secs(120));
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("openwebnet-config-{}.toml", std::process::id()));
    let config = GatewayConfig::default_with_overrides(|c| {
        c.bus.host = "10.0.0.7".to_string();
        c.events.queue_capacity = 64;
    });

    config.save_to_file(&path).expect("save");
    let loaded = GatewayConfig::from_file(&path).expect("load");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.bus.host, "10.0.0.7");
    assert_eq!(loaded.events.queue_capacity, 64);
}

#[test]
fn test_missing_file_is_config_error() {
    let result = GatewayConfig::from_file("/nonexistent/openwebnet.toml");
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to open config file"));
}
