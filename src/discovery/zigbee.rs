//! ZigBee network scan.
//!
//! ```text
//! → *#13**66##                 scan the network
//! ← *#13**66*<count>##         product count, in the reply or later as an event
//! → *#13**67*<index>##         once per product, 0..count
//! ← *#13**67*<index>*<device id>*<product code>*...##
//! ```
//!
//! A product that cannot be read or classified is skipped; a transport error
//! aborts the scan.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::discovery::{DiscoveredDevice, DiscoveryRun};
use crate::error::{OwnError, Result};
use crate::message::gateway::{self, ProductInfo};
use crate::message::{OpenMessage, Where};
use crate::utils::timeout::SCAN_REPLY_TIMEOUT;

impl DiscoveryRun<'_> {
    pub(crate) async fn run_zigbee(mut self) -> Result<Vec<DiscoveredDevice>> {
        let quirks = self.gateway.firmware_quirks();
        // Subscribe before scanning so an early count is not missed
        let mut events = self.gateway.subscribe();

        let scan = self.gateway.send(&gateway::request_scan_network()?).await?;
        if scan.messages().last().is_some_and(|m| m.is_nack()) {
            if !quirks.tolerate_scan_nack {
                return Err(OwnError::ProtocolViolation(
                    "gateway refused the network scan".to_string(),
                ));
            }
            debug!("Network scan NACK tolerated by firmware");
        }

        let count = match scan.messages().iter().find_map(gateway::parse_product_count) {
            Some(count) => count,
            None => wait_for_event(&mut events, SCAN_REPLY_TIMEOUT, gateway::parse_product_count)
                .await?,
        };
        debug!(count, "ZigBee products found");

        if quirks.supervisor_after_scan {
            self.gateway.send(&gateway::request_supervisor()?).await?;
        }

        for index in 0..count {
            match self.product(index, &mut events).await {
                Ok((info, message)) => {
                    self.emit(DiscoveredDevice {
                        address: Where::Zigbee(info.address),
                        device_type: info.device_type,
                        message,
                    })
                    .await;
                }
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => warn!(index, error = %e, "Skipping ZigBee product"),
            }
        }

        self.finish().await
    }

    async fn product(
        &self,
        index: u32,
        events: &mut broadcast::Receiver<OpenMessage>,
    ) -> Result<(ProductInfo, OpenMessage)> {
        let response = self.gateway.send(&gateway::request_product_info(index)?).await?;

        for msg in response.messages() {
            if let Some(info) = gateway::parse_product_info(msg)? {
                if info.index == index {
                    return Ok((info, msg.clone()));
                }
            }
        }
        if response.messages().last().is_some_and(|m| m.is_nack()) {
            return Err(OwnError::ProtocolViolation(format!(
                "product {index} refused by gateway"
            )));
        }

        wait_for_event(events, SCAN_REPLY_TIMEOUT, |msg| {
            match gateway::parse_product_info(msg) {
                Ok(Some(info)) if info.index == index => Some((info, msg.clone())),
                _ => None,
            }
        })
        .await
    }
}

/// First event `pick` accepts, within `limit`.
async fn wait_for_event<T, F>(
    events: &mut broadcast::Receiver<OpenMessage>,
    limit: Duration,
    mut pick: F,
) -> Result<T>
where
    F: FnMut(&OpenMessage) -> Option<T>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let msg = match tokio::time::timeout_at(deadline, events.recv()).await {
            Err(_) => return Err(OwnError::Timeout),
            Ok(Err(RecvError::Lagged(skipped))) => {
                warn!(skipped, "Discovery fell behind the event stream");
                continue;
            }
            Ok(Err(RecvError::Closed)) => return Err(OwnError::ConnectionClosed),
            Ok(Ok(msg)) => msg,
        };
        if let Some(value) = pick(&msg) {
            return Ok(value);
        }
    }
}
