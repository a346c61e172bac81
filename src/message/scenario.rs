//! Scenarios: WHO 0, CEN (WHO 15) and CEN+ / dry contacts (WHO 25).

use crate::error::Result;
use crate::message::address::CenTarget;
use crate::message::{DeviceType, OpenMessage, Where, Who};

/// WHERE addressing every dry contact / IR interface
pub const ALL_DRY_CONTACTS: &str = "30";

pub fn request_dry_contact_status(where_: &str) -> Result<OpenMessage> {
    OpenMessage::status_request(Who::CenPlusScenario, where_)
}

pub fn request_virtual_press(who: Who, what: u32, where_: &str) -> Result<OpenMessage> {
    OpenMessage::command(who, what, where_)
}

pub fn detect_device_type(msg: &OpenMessage) -> Option<DeviceType> {
    if msg.who() != Some(Who::CenPlusScenario) || !msg.is_command() {
        return None;
    }
    match msg.where_addr()? {
        Where::Cen(w) if matches!(w.target, CenTarget::DryContact(n) if n > 0) => {
            Some(DeviceType::ScsDryContactIr)
        }
        _ => None,
    }
}
