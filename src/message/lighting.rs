//! Lighting (WHO 1).

use crate::error::{OwnError, Result};
use crate::message::{DeviceType, OpenMessage, Where, Who};

pub const WHAT_OFF: u32 = 0;
pub const WHAT_ON: u32 = 1;
/// Lowest and highest dimmer level (20% .. 100%)
pub const DIMMER_LEVEL_MIN: u32 = 2;
pub const DIMMER_LEVEL_MAX: u32 = 10;

pub fn request_turn_on(where_: &str) -> Result<OpenMessage> {
    OpenMessage::command(Who::Lighting, WHAT_ON, where_)
}

pub fn request_turn_off(where_: &str) -> Result<OpenMessage> {
    OpenMessage::command(Who::Lighting, WHAT_OFF, where_)
}

/// Set a dimmer to `level` (2..=10).
pub fn request_dimmer_level(where_: &str, level: u32) -> Result<OpenMessage> {
    if !(DIMMER_LEVEL_MIN..=DIMMER_LEVEL_MAX).contains(&level) {
        return Err(OwnError::MalformedFrame(format!(
            "dimmer level {level} outside {DIMMER_LEVEL_MIN}..={DIMMER_LEVEL_MAX}"
        )));
    }
    OpenMessage::command(Who::Lighting, level, where_)
}

pub fn request_status(where_: &str) -> Result<OpenMessage> {
    OpenMessage::status_request(Who::Lighting, where_)
}

/// Classify a lighting status frame.
pub fn detect_device_type(msg: &OpenMessage) -> Option<DeviceType> {
    if msg.who() != Some(Who::Lighting) || !msg.is_command() {
        return None;
    }
    let level = msg.what()?.value;
    let zigbee = matches!(msg.where_addr(), Some(Where::Zigbee(_)));
    match (level, zigbee) {
        (WHAT_OFF | WHAT_ON, false) => Some(DeviceType::ScsOnOffSwitch),
        (WHAT_OFF | WHAT_ON, true) => Some(DeviceType::ZigbeeOnOffSwitch),
        (DIMMER_LEVEL_MIN..=DIMMER_LEVEL_MAX, false) => Some(DeviceType::ScsDimmerSwitch),
        (DIMMER_LEVEL_MIN..=DIMMER_LEVEL_MAX, true) => Some(DeviceType::ZigbeeDimmerSwitch),
        _ => None,
    }
}
