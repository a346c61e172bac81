//! Auxiliary channels (WHO 9).

use crate::error::Result;
use crate::message::{DeviceType, OpenMessage, Where, Who};

pub fn request_status(where_: &str) -> Result<OpenMessage> {
    OpenMessage::status_request(Who::Auxiliary, where_)
}

pub fn detect_device_type(msg: &OpenMessage) -> Option<DeviceType> {
    if msg.who() != Some(Who::Auxiliary) || !msg.is_command() {
        return None;
    }
    match msg.where_addr()? {
        Where::Auxiliary(w) if w.channel > 0 => Some(DeviceType::ScsAuxiliary),
        _ => None,
    }
}
