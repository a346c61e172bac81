//! # OpenWebNet
//!
//! Async client for BTicino / Legrand OpenWebNet gateways.
//!
//! ## Layers
//! - [`core`]: frame validation, construction and the `##` stream codec
//! - [`message`]: decoded messages, WHO families, WHERE grammars, device types
//! - [`protocol`]: session handshake (OPEN and HMAC), responses, listener dispatch
//! - [`transport`]: TCP and serial connectors producing framed channels
//! - [`session`]: BUS (MON + CMD) and USB gateway sessions with reconnection
//! - [`discovery`]: BUS category walk and ZigBee network scan
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, metrics
//!
//! ## Example
//! ```rust,no_run
//! use openwebnet::config::GatewayConfig;
//! use openwebnet::discovery::DiscoveryEngine;
//! use openwebnet::message::lighting;
//! use openwebnet::session::{BusSession, Gateway};
//! use openwebnet::utils::logging::init_logging;
//!
//! # async fn run() -> openwebnet::error::Result<()> {
//! let config = GatewayConfig::from_env()?;
//! init_logging(&config.logging)?;
//!
//! let session = BusSession::tcp(&config);
//! session.connect().await?;
//! session.send(&lighting::request_turn_on("12")?).await?;
//!
//! let devices = DiscoveryEngine::new().discover_bus(&session).await?;
//! println!("{} devices", devices.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod discovery;
pub mod error;
pub mod message;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod utils;

pub use config::GatewayConfig;
pub use discovery::{DiscoveredDevice, DiscoveryEngine};
pub use error::{OwnError, Result};
pub use message::{DeviceType, OpenMessage, Where, Who};
pub use protocol::{GatewayListener, Response};
pub use session::{BusSession, ChannelState, Gateway, UsbSession};
