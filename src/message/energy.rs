//! Energy management (WHO 18) and its diagnostic family (WHO 1018).

use crate::error::Result;
use crate::message::address::EnergyTarget;
use crate::message::{DeviceType, OpenMessage, Where, Who};

pub const DIM_DIAGNOSTIC: u32 = 7;
/// Active power, in watts
pub const DIM_ACTIVE_POWER: u32 = 113;

pub fn request_diagnostic(where_: &str) -> Result<OpenMessage> {
    OpenMessage::dimension_request(Who::EnergyDiagnostic, where_, DIM_DIAGNOSTIC)
}

pub fn request_active_power(where_: &str) -> Result<OpenMessage> {
    OpenMessage::dimension_request(Who::EnergyManagement, where_, DIM_ACTIVE_POWER)
}

pub fn detect_device_type(msg: &OpenMessage) -> Option<DeviceType> {
    if !matches!(msg.who(), Some(Who::EnergyManagement | Who::EnergyDiagnostic)) {
        return None;
    }
    match msg.where_addr()? {
        Where::Energy(w) if matches!(w.target, EnergyTarget::Meter(_)) => {
            Some(DeviceType::ScsEnergyMeter)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_and_detect() {
        assert_eq!(request_diagnostic("0").unwrap().frame(), "*#1018*0*7##");
        assert_eq!(request_active_power("51").unwrap().frame(), "*#18*51*113##");
        let reply = OpenMessage::parse("*#1018*52*7*1##").unwrap();
        assert_eq!(detect_device_type(&reply), Some(DeviceType::ScsEnergyMeter));
        let general = OpenMessage::parse("*#1018*0*7*1##").unwrap();
        assert_eq!(detect_device_type(&general), None);
    }
}
