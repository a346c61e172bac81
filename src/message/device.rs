use std::fmt;

/// Classified device kinds, as reported by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    // BUS (SCS) devices
    ScsOnOffSwitch,
    ScsDimmerSwitch,
    ScsShutterControl,
    ScsEnergyMeter,
    ScsThermoSensor,
    ScsThermoZone,
    ScsThermoCentralUnit,
    ScsDryContactIr,
    ScsAuxiliary,
    ScsAlarmCentralUnit,
    ScsAlarmZone,
    // ZigBee devices
    ZigbeeOnOffSwitch,
    ZigbeeDimmerControl,
    ZigbeeDimmerSwitch,
    ZigbeeSwitchMotionDetector,
    ZigbeeDaylightSensor,
    ZigbeeScenarioControl,
    ZigbeeOnOffSwitchUnit,
    ZigbeeShutterSwitch,
    ZigbeeShutterControl,
    ZigbeeAuxiliaryOnOffSwitch,
}

impl DeviceType {
    /// Map a ZigBee product code to a device kind.
    pub fn from_zigbee_code(code: u32) -> Option<DeviceType> {
        match code {
            256 => Some(DeviceType::ZigbeeOnOffSwitch),
            257 => Some(DeviceType::ZigbeeDimmerControl),
            258 => Some(DeviceType::ZigbeeDimmerSwitch),
            259 => Some(DeviceType::ZigbeeSwitchMotionDetector),
            260 => Some(DeviceType::ZigbeeDaylightSensor),
            261 => Some(DeviceType::ZigbeeScenarioControl),
            262 => Some(DeviceType::ZigbeeOnOffSwitchUnit),
            512 => Some(DeviceType::ZigbeeShutterSwitch),
            513 => Some(DeviceType::ZigbeeShutterControl),
            9986 => Some(DeviceType::ZigbeeAuxiliaryOnOffSwitch),
            _ => None,
        }
    }

    pub fn is_zigbee(self) -> bool {
        matches!(
            self,
            DeviceType::ZigbeeOnOffSwitch
                | DeviceType::ZigbeeDimmerControl
                | DeviceType::ZigbeeDimmerSwitch
                | DeviceType::ZigbeeSwitchMotionDetector
                | DeviceType::ZigbeeDaylightSensor
                | DeviceType::ZigbeeScenarioControl
                | DeviceType::ZigbeeOnOffSwitchUnit
                | DeviceType::ZigbeeShutterSwitch
                | DeviceType::ZigbeeShutterControl
                | DeviceType::ZigbeeAuxiliaryOnOffSwitch
        )
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
