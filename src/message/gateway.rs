//! Gateway management (WHO 13).
//!
//! Requests addressed to the gateway itself: model and firmware queries,
//! supervisor mode and the ZigBee network scan.

use crate::error::{OwnError, Result};
use crate::message::address::WhereZigbee;
use crate::message::{DeviceType, OpenMessage, Who};

/// Gateway model; also used as the liveness probe
pub const DIM_MODEL: u32 = 15;
pub const DIM_FIRMWARE_VERSION: u32 = 16;
/// Supervisor mode (command) / number of products found by a scan (dimension)
pub const SUPERVISOR: u32 = 66;
pub const DIM_PRODUCT_INFO: u32 = 67;

/// `*#13**15##`
pub fn request_model() -> Result<OpenMessage> {
    OpenMessage::dimension_request(Who::GatewayManagement, "", DIM_MODEL)
}

/// `*#13**16##`
pub fn request_firmware_version() -> Result<OpenMessage> {
    OpenMessage::dimension_request(Who::GatewayManagement, "", DIM_FIRMWARE_VERSION)
}

/// `*13*66*##`
pub fn request_supervisor() -> Result<OpenMessage> {
    OpenMessage::command(Who::GatewayManagement, SUPERVISOR, "")
}

/// `*#13**66##`
pub fn request_scan_network() -> Result<OpenMessage> {
    OpenMessage::dimension_request(Who::GatewayManagement, "", SUPERVISOR)
}

/// `*#13**67*<index>##`
pub fn request_product_info(index: u32) -> Result<OpenMessage> {
    OpenMessage::parse(&format!("*#13**{DIM_PRODUCT_INFO}*{index}##"))
}

fn gateway_dim(msg: &OpenMessage, code: u32) -> bool {
    msg.who() == Some(Who::GatewayManagement) && msg.dim().is_some_and(|d| d.code == code)
}

/// `*#13**16*V1*V2*V3##` → `"V1.V2.V3"`
pub fn parse_firmware_version(msg: &OpenMessage) -> Option<String> {
    if !gateway_dim(msg, DIM_FIRMWARE_VERSION) || msg.dim_values().is_empty() {
        return None;
    }
    let parts: Option<Vec<u32>> = msg
        .dim_values()
        .iter()
        .map(|v| v.parse::<u32>().ok())
        .collect();
    parts.map(|p| {
        p.iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".")
    })
}

/// `*#13**66*<count>##` → `count`
pub fn parse_product_count(msg: &OpenMessage) -> Option<u32> {
    if !gateway_dim(msg, SUPERVISOR) {
        return None;
    }
    msg.dim_values().first()?.parse().ok()
}

/// A device reported by a product information reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub index: u32,
    pub address: WhereZigbee,
    pub device_type: DeviceType,
}

/// Decode `*#13**67*<index>*<device id>*<product code>*...##`.
///
/// Returns `Ok(None)` for frames that are not product information replies.
pub fn parse_product_info(msg: &OpenMessage) -> Result<Option<ProductInfo>> {
    if !gateway_dim(msg, DIM_PRODUCT_INFO) {
        return Ok(None);
    }
    let values = msg.dim_values();
    if values.len() < 3 {
        // `*#13**67*<index>##` is the request echo
        return Ok(None);
    }

    let index = values[0]
        .parse::<u32>()
        .map_err(|_| OwnError::MalformedFrame(format!("invalid product index: {msg}")))?;
    let address = WhereZigbee::from_device_id(&values[1])?;
    let code = values[2]
        .parse::<u32>()
        .map_err(|_| OwnError::MalformedFrame(format!("invalid product code: {msg}")))?;
    let device_type = DeviceType::from_zigbee_code(code)
        .ok_or_else(|| OwnError::UnsupportedFrame(format!("ZigBee product code {code}")))?;

    Ok(Some(ProductInfo {
        index,
        address,
        device_type,
    }))
}
