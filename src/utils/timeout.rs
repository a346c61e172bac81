//! Protocol timing constants and timeout helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::{OwnError, Result};

/// TCP connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest wait for the next reply frame on the command channel
pub const CMD_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Silence on the monitor channel before the gateway is probed
pub const MON_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Monitor keepalive period
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(90);

/// Upper bound for a complete session handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// A command channel idle longer than this is reopened before use
pub const CMD_FRESH_WINDOW: Duration = Duration::from_secs(120);

/// Wait for asynchronous ZigBee scan replies
pub const SCAN_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// First reconnect delay
pub const RECONNECT_INITIAL_DELAY: Duration = Duration::from_millis(2500);

/// Reconnect delay ceiling
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_millis(60_000);

/// Await a fallible future, mapping expiry to [`OwnError::Timeout`].
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(OwnError::Timeout),
    }
}
