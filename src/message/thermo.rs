//! Thermoregulation (WHO 4) and its diagnostic family (WHO 1004).

use crate::error::Result;
use crate::message::address::ThermoTarget;
use crate::message::{DeviceType, OpenMessage, Where, Who};

/// Diagnostic dimension reporting each device of the installation
pub const DIM_DIAGNOSTIC: u32 = 7;

pub fn request_status(where_: &str) -> Result<OpenMessage> {
    OpenMessage::status_request(Who::Thermoregulation, where_)
}

/// `*#1004*WHERE*7##`, answered once per configured zone, probe and central unit.
pub fn request_diagnostic(where_: &str) -> Result<OpenMessage> {
    OpenMessage::dimension_request(Who::ThermoregulationDiagnostic, where_, DIM_DIAGNOSTIC)
}

pub fn detect_device_type(msg: &OpenMessage) -> Option<DeviceType> {
    if !matches!(
        msg.who(),
        Some(Who::Thermoregulation | Who::ThermoregulationDiagnostic)
    ) {
        return None;
    }
    match msg.where_addr()? {
        Where::Thermo(w) => Some(match w.target {
            ThermoTarget::All | ThermoTarget::CentralUnit99 => DeviceType::ScsThermoCentralUnit,
            ThermoTarget::ExternalProbe(_) => DeviceType::ScsThermoSensor,
            ThermoTarget::Zone(_)
            | ThermoTarget::ZoneViaCentral(_)
            | ThermoTarget::Actuator { .. } => DeviceType::ScsThermoZone,
        }),
        _ => None,
    }
}

/// Whether `msg` comes from a 99-zone central unit (`#`-prefixed WHERE).
pub fn is_central_unit_99_zones(msg: &OpenMessage) -> bool {
    matches!(
        msg.where_addr(),
        Some(Where::Thermo(w)) if w.target == ThermoTarget::CentralUnit99
    )
}
