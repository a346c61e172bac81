//! Burglar alarm (WHO 5).

use crate::error::Result;
use crate::message::address::AlarmTarget;
use crate::message::{DeviceType, OpenMessage, Where, Who};

pub fn request_system_status() -> Result<OpenMessage> {
    OpenMessage::status_request(Who::BurglarAlarm, "0")
}

pub fn detect_device_type(msg: &OpenMessage) -> Option<DeviceType> {
    if msg.who() != Some(Who::BurglarAlarm) {
        return None;
    }
    match msg.where_addr() {
        // System replies may omit the WHERE entirely
        None => Some(DeviceType::ScsAlarmCentralUnit),
        Some(Where::Alarm(w)) => Some(match w.target {
            AlarmTarget::CentralUnit => DeviceType::ScsAlarmCentralUnit,
            AlarmTarget::Zone(_) => DeviceType::ScsAlarmZone,
        }),
        Some(_) => None,
    }
}
