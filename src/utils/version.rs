//! Firmware version comparison and the gateway quirks it gates.

use std::cmp::Ordering;

/// Newest firmware that drops supervisor mode after a network scan
pub const SUPERVISOR_REFRESH_MAX_FIRMWARE: &str = "1.2.3";

/// Newest firmware that answers a network scan with NACK
pub const SCAN_NACK_MAX_FIRMWARE: &str = "1.2.0";

/// Compare dotted version strings component by component.
///
/// Missing components count as `0`; a non-numeric component also counts as `0`.
pub fn version_compare(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u32> {
        v.trim()
            .split('.')
            .map(|part| part.parse::<u32>().unwrap_or(0))
            .collect()
    };
    let (left, right) = (parse(a), parse(b));
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Behavioural differences of ZigBee gateway firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareQuirks {
    /// Supervisor mode must be re-sent after a network scan
    pub supervisor_after_scan: bool,
    /// A NACK reply to the network scan is not an error
    pub tolerate_scan_nack: bool,
}

impl FirmwareQuirks {
    pub fn for_version(version: &str) -> Self {
        Self {
            supervisor_after_scan: version_compare(version, SUPERVISOR_REFRESH_MAX_FIRMWARE)
                != Ordering::Greater,
            tolerate_scan_nack: version_compare(version, SCAN_NACK_MAX_FIRMWARE)
                != Ordering::Greater,
        }
    }
}
