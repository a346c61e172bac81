//! # Configuration Management
//!
//! Centralized configuration for gateway sessions.
//!
//! This module provides structured configuration for BUS (Ethernet) and USB
//! gateways, protocol timing, the reconnect policy, listener dispatch and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`OWN_*` variables)
//!
//! ## Example
//! ```toml
//! [bus]
//! host = "192.168.1.35"
//! port = 20000
//! password = "12345"
//!
//! [reconnect]
//! auto_reconnect = true
//! initial_delay = 2500
//! max_delay = 60000
//! ```

use crate::error::{OwnError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default TCP port of BUS gateways
pub const DEFAULT_GATEWAY_PORT: u16 = 20000;

/// Factory password of BUS gateways
pub const DEFAULT_PASSWORD: &str = "12345";

/// Serial speed of USB ZigBee gateways
pub const DEFAULT_SERIAL_BAUD_RATE: u32 = 19200;

/// Default capacity of the listener event queue
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GatewayConfig {
    /// BUS gateway connection
    #[serde(default)]
    pub bus: BusConfig,

    /// USB gateway connection
    #[serde(default)]
    pub usb: UsbConfig,

    /// Protocol timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Reconnect policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Listener dispatch
    #[serde(default)]
    pub events: EventConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| OwnError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| OwnError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| OwnError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("OWN_GATEWAY_HOST") {
            config.bus.host = host;
        }

        if let Ok(port) = std::env::var("OWN_GATEWAY_PORT") {
            config.bus.port = port
                .parse::<u16>()
                .map_err(|_| OwnError::ConfigError(format!("Invalid OWN_GATEWAY_PORT: {port}")))?;
        }

        if let Ok(password) = std::env::var("OWN_GATEWAY_PASSWORD") {
            config.bus.password = password;
        }

        if let Ok(port_name) = std::env::var("OWN_SERIAL_PORT") {
            config.usb.port_name = port_name;
        }

        if let Ok(flag) = std::env::var("OWN_AUTO_RECONNECT") {
            if let Ok(val) = flag.parse::<bool>() {
                config.reconnect.auto_reconnect = val;
            }
        }

        if let Ok(level) = std::env::var("OWN_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| OwnError::ConfigError(format!("Invalid OWN_LOG_LEVEL: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OwnError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| OwnError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.bus.validate());
        errors.extend(self.usb.validate());
        errors.extend(self.timing.validate());
        errors.extend(self.reconnect.validate());
        errors.extend(self.events.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(OwnError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// BUS (Ethernet) gateway settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    /// Gateway host name or IP address
    pub host: String,

    /// Gateway TCP port
    pub port: u16,

    /// OPEN (numeric) or HMAC password
    pub password: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: DEFAULT_GATEWAY_PORT,
            password: String::from(DEFAULT_PASSWORD),
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("Gateway host cannot be empty".to_string());
        }

        if self.port == 0 {
            errors.push("Gateway port must be greater than 0".to_string());
        }

        if self.password.is_empty() {
            errors.push("Gateway password cannot be empty".to_string());
        } else if !self.password.bytes().all(|b| b.is_ascii_alphanumeric()) {
            errors.push("Gateway password must be alphanumeric".to_string());
        }

        errors
    }
}

/// USB (ZigBee) gateway settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UsbConfig {
    /// Serial device, e.g. `/dev/ttyUSB0` or `COM3`
    pub port_name: String,

    /// Serial speed
    pub baud_rate: u32,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            port_name: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_SERIAL_BAUD_RATE,
        }
    }
}

impl UsbConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port_name.trim().is_empty() {
            errors.push("Serial port name cannot be empty".to_string());
        }

        if self.baud_rate == 0 {
            errors.push("Serial baud rate must be greater than 0".to_string());
        }

        errors
    }
}

/// Protocol timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Transport connect timeout
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Wait for each reply frame on the command channel
    #[serde(with = "duration_serde")]
    pub cmd_read_timeout: Duration,

    /// Monitor silence before a liveness probe
    #[serde(with = "duration_serde")]
    pub mon_read_timeout: Duration,

    /// Monitor keepalive period
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// Bound for a complete handshake
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Idle time after which the command channel is reopened before use
    #[serde(with = "duration_serde")]
    pub cmd_fresh_window: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout: timeout::CONNECT_TIMEOUT,
            cmd_read_timeout: timeout::CMD_READ_TIMEOUT,
            mon_read_timeout: timeout::MON_READ_TIMEOUT,
            keepalive_interval: timeout::KEEPALIVE_INTERVAL,
            handshake_timeout: timeout::HANDSHAKE_TIMEOUT,
            cmd_fresh_window: timeout::CMD_FRESH_WINDOW,
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
        }

        if self.cmd_read_timeout.as_millis() < 100 {
            errors.push("Command read timeout too short (minimum: 100ms)".to_string());
        }

        if self.keepalive_interval.as_millis() < 100 {
            errors.push("Keepalive interval too short (minimum: 100ms)".to_string());
        }

        // Keepalive must fire before the monitor read times out.
        if self.keepalive_interval >= self.mon_read_timeout {
            errors.push(format!(
                "Keepalive interval ({}ms) must be shorter than the monitor read timeout ({}ms)",
                self.keepalive_interval.as_millis(),
                self.mon_read_timeout.as_millis()
            ));
        }

        if self.cmd_fresh_window.is_zero() {
            errors.push("Command freshness window must be greater than 0".to_string());
        }

        errors
    }
}

/// Reconnect policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectConfig {
    /// Whether to reconnect automatically when the monitor channel is lost
    pub auto_reconnect: bool,

    /// Delay before the first attempt
    #[serde(with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound of the doubling delay
    #[serde(with = "duration_serde")]
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            initial_delay: timeout::RECONNECT_INITIAL_DELAY,
            max_delay: timeout::RECONNECT_MAX_DELAY,
        }
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.initial_delay.is_zero() {
            errors.push("Reconnect initial delay must be greater than 0".to_string());
        }

        if self.max_delay < self.initial_delay {
            errors.push("Reconnect max delay cannot be smaller than the initial delay".to_string());
        } else if self.max_delay.as_secs() > 3600 {
            errors.push("Reconnect max delay too long (maximum: 1 hour)".to_string());
        }

        errors
    }
}

/// Listener dispatch settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventConfig {
    /// Capacity of the ordered listener queue
    pub queue_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

impl EventConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.queue_capacity == 0 {
            errors.push("Event queue capacity must be greater than 0".to_string());
        } else if self.queue_capacity > 1_000_000 {
            errors.push(format!(
                "Event queue capacity too large: {} (max recommended: 1,000,000)",
                self.queue_capacity
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to include the event target
    pub with_target: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("openwebnet"),
            log_level: Level::INFO,
            with_target: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
