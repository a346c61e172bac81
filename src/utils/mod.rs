//! # Utility Modules
//!
//! Supporting utilities for logging, timing and firmware gating.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` initialisation from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: per-session atomic counters
//! - **Timeout**: protocol timing constants and async timeout wrappers
//! - **Version**: firmware version comparison and ZigBee gateway quirks

pub mod logging;
pub mod metrics;
pub mod timeout;
pub mod version;

pub use metrics::{Metrics, MetricsSnapshot};
pub use version::FirmwareQuirks;
