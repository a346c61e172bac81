//! # Device Discovery
//!
//! Finds the devices behind a gateway and reports each one once.
//!
//! A BUS installation is walked one category at a time, each with a single
//! status or diagnostic request whose replies are classified by the family
//! modules. A ZigBee network is scanned instead (see [`zigbee`]).
//!
//! Every device found is sent to listeners as `on_new_device` and returned to
//! the caller. `on_discovery_completed` fires once after the last category;
//! an error stops the run without it.

pub mod zigbee;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::error::{OwnError, Result};
use crate::message::address::WhereAlarm;
use crate::message::{
    alarm, automation, auxiliary, energy, lighting, scenario, thermo, DeviceType, OpenMessage,
    Where,
};
use crate::protocol::{GatewayEvent, Response};
use crate::session::Gateway;

/// A device reported during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: Where,
    pub device_type: DeviceType,
    /// The reply the device was classified from
    pub message: OpenMessage,
}

/// Runs discoveries, one at a time.
///
/// A call made while another is running fails with
/// [`OwnError::DiscoveryInProgress`]; it is not queued.
#[derive(Debug, Default)]
pub struct DiscoveryEngine {
    active: AtomicBool,
}

impl DiscoveryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Query every BUS category in order.
    #[instrument(skip_all)]
    pub async fn discover_bus(&self, gateway: &dyn Gateway) -> Result<Vec<DiscoveredDevice>> {
        self.begin(gateway)?.run_bus().await
    }

    /// Scan the ZigBee network of a USB gateway.
    #[instrument(skip_all)]
    pub async fn discover_zigbee(&self, gateway: &dyn Gateway) -> Result<Vec<DiscoveredDevice>> {
        self.begin(gateway)?.run_zigbee().await
    }

    fn begin<'a>(&'a self, gateway: &'a dyn Gateway) -> Result<DiscoveryRun<'a>> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OwnError::DiscoveryInProgress);
        }
        Ok(DiscoveryRun {
            gateway,
            _active: ActiveGuard(&self.active),
            found: Vec::new(),
        })
    }
}

/// Clears the engine's running flag however the run ends.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One discovery, consumed by running it.
pub(crate) struct DiscoveryRun<'a> {
    gateway: &'a dyn Gateway,
    _active: ActiveGuard<'a>,
    found: Vec<DiscoveredDevice>,
}

impl DiscoveryRun<'_> {
    async fn run_bus(mut self) -> Result<Vec<DiscoveredDevice>> {
        for category in Category::ALL {
            let request = category.request()?;
            debug!(category = category.name(), %request, "Discovery request");

            let response = self.gateway.send(&request).await?;
            let devices = category.collect(&response);
            debug!(category = category.name(), devices = devices.len(), "Category done");

            for device in devices {
                self.emit(device).await;
            }
        }
        self.finish().await
    }

    async fn emit(&mut self, device: DiscoveredDevice) {
        info!(
            address = %device.address.value(),
            device_type = ?device.device_type,
            "Device discovered"
        );
        self.gateway
            .notifier()
            .notify(GatewayEvent::NewDevice {
                address: device.address.clone(),
                device_type: device.device_type,
                message: device.message.clone(),
            })
            .await;
        self.found.push(device);
    }

    async fn finish(self) -> Result<Vec<DiscoveredDevice>> {
        info!(devices = self.found.len(), "Discovery completed");
        self.gateway
            .notifier()
            .notify(GatewayEvent::DiscoveryCompleted)
            .await;
        Ok(self.found)
    }
}

/// BUS device categories, in query order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Lighting,
    Automation,
    Energy,
    Thermoregulation,
    DryContact,
    Auxiliary,
    Alarm,
}

impl Category {
    const ALL: [Category; 7] = [
        Category::Lighting,
        Category::Automation,
        Category::Energy,
        Category::Thermoregulation,
        Category::DryContact,
        Category::Auxiliary,
        Category::Alarm,
    ];

    fn name(self) -> &'static str {
        match self {
            Category::Lighting => "lighting",
            Category::Automation => "automation",
            Category::Energy => "energy",
            Category::Thermoregulation => "thermoregulation",
            Category::DryContact => "dry contact",
            Category::Auxiliary => "auxiliary",
            Category::Alarm => "alarm",
        }
    }

    fn request(self) -> Result<OpenMessage> {
        match self {
            Category::Lighting => lighting::request_status("0"),
            Category::Automation => automation::request_status("0"),
            Category::Energy => energy::request_diagnostic("0"),
            Category::Thermoregulation => thermo::request_diagnostic("0"),
            Category::DryContact => scenario::request_dry_contact_status(scenario::ALL_DRY_CONTACTS),
            Category::Auxiliary => auxiliary::request_status("0"),
            Category::Alarm => alarm::request_system_status(),
        }
    }

    fn detect(self, msg: &OpenMessage) -> Option<DeviceType> {
        match self {
            Category::Lighting => lighting::detect_device_type(msg),
            Category::Automation => automation::detect_device_type(msg),
            Category::Energy => energy::detect_device_type(msg),
            Category::Thermoregulation => thermo::detect_device_type(msg),
            Category::DryContact => scenario::detect_device_type(msg),
            Category::Auxiliary => auxiliary::detect_device_type(msg),
            Category::Alarm => alarm::detect_device_type(msg),
        }
    }

    /// Classify the replies of one category.
    ///
    /// Each address is reported once. Thermoregulation and alarm report a
    /// single central unit, first; a 99-zone thermo central unit (`#` WHERE)
    /// wins over a 4-zone one.
    fn collect(self, response: &Response) -> Vec<DiscoveredDevice> {
        match response.messages().last() {
            Some(terminal) if terminal.is_busy_nack() => {
                warn!(category = self.name(), "Gateway busy, category skipped");
                return Vec::new();
            }
            Some(terminal) if terminal.is_nack() => {
                debug!(category = self.name(), "No devices in category");
                return Vec::new();
            }
            _ => {}
        }

        let mut central: Option<DiscoveredDevice> = None;
        let mut others = Vec::new();
        let mut seen = HashSet::new();

        for msg in response.messages().iter().filter(|m| !m.is_terminal()) {
            let Some(device_type) = self.detect(msg) else {
                continue;
            };
            let Some(address) = device_address(msg, device_type) else {
                continue;
            };
            let device = DiscoveredDevice {
                address,
                device_type,
                message: msg.clone(),
            };

            let is_central = matches!(
                device_type,
                DeviceType::ScsThermoCentralUnit | DeviceType::ScsAlarmCentralUnit
            );
            if is_central {
                let replace = match &central {
                    None => true,
                    Some(current) => {
                        self == Category::Thermoregulation
                            && !thermo::is_central_unit_99_zones(&current.message)
                            && thermo::is_central_unit_99_zones(msg)
                    }
                };
                if replace {
                    central = Some(device);
                }
            } else if seen.insert(device.address.value().to_string()) {
                others.push(device);
            }
        }

        central.into_iter().chain(others).collect()
    }
}

/// WHERE of a classified reply; alarm system replies carry none.
fn device_address(msg: &OpenMessage, device_type: DeviceType) -> Option<Where> {
    match msg.where_addr() {
        Some(address) => Some(address.clone()),
        None if device_type == DeviceType::ScsAlarmCentralUnit => {
            WhereAlarm::parse("0").ok().map(Where::Alarm)
        }
        None => None,
    }
}
