//! Automation / shutters (WHO 2).

use crate::error::Result;
use crate::message::{DeviceType, OpenMessage, Where, Who};

pub const WHAT_STOP: u32 = 0;
pub const WHAT_UP: u32 = 1;
pub const WHAT_DOWN: u32 = 2;

pub fn request_stop(where_: &str) -> Result<OpenMessage> {
    OpenMessage::command(Who::Automation, WHAT_STOP, where_)
}

pub fn request_move_up(where_: &str) -> Result<OpenMessage> {
    OpenMessage::command(Who::Automation, WHAT_UP, where_)
}

pub fn request_move_down(where_: &str) -> Result<OpenMessage> {
    OpenMessage::command(Who::Automation, WHAT_DOWN, where_)
}

pub fn request_status(where_: &str) -> Result<OpenMessage> {
    OpenMessage::status_request(Who::Automation, where_)
}

pub fn detect_device_type(msg: &OpenMessage) -> Option<DeviceType> {
    if msg.who() != Some(Who::Automation) || !msg.is_command() {
        return None;
    }
    match msg.what()?.value {
        WHAT_STOP | WHAT_UP | WHAT_DOWN => match msg.where_addr() {
            Some(Where::Zigbee(_)) => Some(DeviceType::ZigbeeShutterControl),
            _ => Some(DeviceType::ScsShutterControl),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_and_detect() {
        assert_eq!(request_move_up("21").unwrap().frame(), "*2*1*21##");
        assert_eq!(request_status("0").unwrap().frame(), "*#2*0##");
        let reply = OpenMessage::parse("*2*0*21##").unwrap();
        assert_eq!(detect_device_type(&reply), Some(DeviceType::ScsShutterControl));
        let lighting = OpenMessage::parse("*1*0*21##").unwrap();
        assert_eq!(detect_device_type(&lighting), None);
    }
}
