//! # Gateway Sessions
//!
//! Connection management for BUS and USB gateways.
//!
//! ## Components
//! - [`BusSession`]: Ethernet gateways, one monitor (MON) and one command (CMD) channel
//! - [`UsbSession`]: ZigBee USB gateways, one serial channel for both
//! - [`ReconnectBackoff`]: delay policy shared by both reconnect loops
//!
//! Both sessions implement [`Gateway`], which is all discovery needs.

pub mod backoff;
pub mod bus;
pub mod usb;

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{OwnError, Result};
use crate::message::OpenMessage;
use crate::protocol::{Notifier, Response};
use crate::utils::FirmwareQuirks;

pub use backoff::ReconnectBackoff;
pub use bus::BusSession;
pub use usb::UsbSession;

/// Capacity of the raw event broadcast
pub(crate) const EVENT_BROADCAST_CAPACITY: usize = 256;

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Lifecycle of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Closed,
    Connecting,
    Handshaking,
    Open,
}

/// Operations shared by BUS and USB sessions.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a request and collect its replies up to the terminal ACK/NACK.
    async fn send(&self, msg: &OpenMessage) -> Result<Response>;

    fn notifier(&self) -> &Notifier;

    /// Raw event messages, in arrival order
    fn subscribe(&self) -> broadcast::Receiver<OpenMessage>;

    fn firmware_quirks(&self) -> FirmwareQuirks {
        FirmwareQuirks::default()
    }
}

/// Retry `attempt` with backoff until it succeeds, fails authentication or
/// `cancel` fires. Returns the number of attempts made.
pub(crate) async fn reconnect_with_backoff<F, Fut>(
    backoff: &ReconnectBackoff,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut failures: u32 = 0;
    loop {
        let delay = backoff.delay_for(failures);
        info!(attempt = failures + 1, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");

        tokio::select! {
            _ = cancel.cancelled() => return Err(OwnError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        match attempt().await {
            Ok(()) => return Ok(failures + 1),
            Err(e) if e.is_authentication() => {
                warn!(error = %e, "Reconnect aborted by authentication failure");
                return Err(e);
            }
            Err(e) => {
                warn!(attempt = failures + 1, error = %e, "Reconnect attempt failed");
                failures = failures.saturating_add(1);
            }
        }
    }
}
