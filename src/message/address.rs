//! WHERE grammars.
//!
//! Each family addresses devices with its own WHERE syntax. Addresses are
//! validated when a message is constructed, so an out-of-range value never
//! reaches a session.

use std::fmt;

use crate::error::{OwnError, Result};
use crate::message::who::WhereGrammar;

/// Local bus separator in lighting/automation addresses
const LOCAL_BUS: &str = "#4#";

/// ZigBee address suffix
const ZIGBEE_SUFFIX: &str = "#9";

fn malformed(kind: &str, raw: &str) -> OwnError {
    OwnError::MalformedFrame(format!("invalid {kind} WHERE: {raw}"))
}

fn digits(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

fn number_in<T>(raw: &str, range: std::ops::RangeInclusive<u32>, kind: &str, full: &str) -> Result<T>
where
    T: TryFrom<u32>,
{
    if !digits(raw) {
        return Err(malformed(kind, full));
    }
    let value = raw.parse::<u32>().map_err(|_| malformed(kind, full))?;
    if !range.contains(&value) {
        return Err(malformed(kind, full));
    }
    T::try_from(value).map_err(|_| malformed(kind, full))
}

/// A decoded WHERE address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Where {
    LightAutom(WhereLightAutom),
    Thermo(WhereThermo),
    Alarm(WhereAlarm),
    Energy(WhereEnergy),
    Zigbee(WhereZigbee),
    Auxiliary(WhereAux),
    Cen(WhereCen),
    /// Gateway management addresses carry no structure
    Gateway(String),
}

impl Where {
    /// Decode `raw` with the grammar of a family.
    ///
    /// ZigBee addresses (`...#9`) are recognised for every family carried by
    /// a USB gateway.
    pub fn parse(grammar: WhereGrammar, raw: &str) -> Result<Self> {
        if WhereZigbee::looks_like(raw) {
            return WhereZigbee::parse(raw).map(Where::Zigbee);
        }
        match grammar {
            WhereGrammar::LightAutom => WhereLightAutom::parse(raw).map(Where::LightAutom),
            WhereGrammar::Thermo => WhereThermo::parse(raw).map(Where::Thermo),
            WhereGrammar::Alarm => WhereAlarm::parse(raw).map(Where::Alarm),
            WhereGrammar::Energy => WhereEnergy::parse(raw).map(Where::Energy),
            WhereGrammar::Auxiliary => WhereAux::parse(raw).map(Where::Auxiliary),
            WhereGrammar::Cen => WhereCen::parse(raw, false).map(Where::Cen),
            WhereGrammar::CenPlus => WhereCen::parse(raw, true).map(Where::Cen),
            WhereGrammar::Gateway => {
                if raw.is_empty() || digits(raw) {
                    Ok(Where::Gateway(raw.to_string()))
                } else {
                    Err(malformed("gateway", raw))
                }
            }
        }
    }

    /// The address exactly as it appears on the wire.
    pub fn value(&self) -> &str {
        match self {
            Where::LightAutom(w) => &w.raw,
            Where::Thermo(w) => &w.raw,
            Where::Alarm(w) => &w.raw,
            Where::Energy(w) => &w.raw,
            Where::Zigbee(w) => &w.raw,
            Where::Auxiliary(w) => &w.raw,
            Where::Cen(w) => &w.raw,
            Where::Gateway(raw) => raw,
        }
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// Target of a lighting or automation address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightAutomTarget {
    General,
    Area(u8),
    Group(u8),
    Point { area: u8, point: u8 },
}

/// Lighting / automation address with optional local bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereLightAutom {
    raw: String,
    pub target: LightAutomTarget,
    pub bus: Option<u8>,
}

impl WhereLightAutom {
    pub fn parse(raw: &str) -> Result<Self> {
        const KIND: &str = "lighting/automation";

        let (base, bus) = match raw.find(LOCAL_BUS) {
            Some(idx) => {
                let bus_raw = &raw[idx + LOCAL_BUS.len()..];
                (&raw[..idx], Some(number_in::<u8>(bus_raw, 1..=15, KIND, raw)?))
            }
            None => (raw, None),
        };

        let target = if let Some(group) = base.strip_prefix('#') {
            LightAutomTarget::Group(number_in(group, 1..=255, KIND, raw)?)
        } else {
            if !digits(base) {
                return Err(malformed(KIND, raw));
            }
            let d: Vec<u8> = base.bytes().map(|b| b - b'0').collect();
            match d.as_slice() {
                [0] => LightAutomTarget::General,
                [a] => LightAutomTarget::Area(*a),
                [0, 0] => LightAutomTarget::Area(0),
                [1, 0] => LightAutomTarget::Area(10),
                [a @ 1..=9, p @ 1..=9] => LightAutomTarget::Point { area: *a, point: *p },
                [_, _, _, _] => {
                    let area = number_in::<u8>(&base[..2], 0..=10, KIND, raw)?;
                    let point = number_in::<u8>(&base[2..], 1..=15, KIND, raw)?;
                    LightAutomTarget::Point { area, point }
                }
                _ => return Err(malformed(KIND, raw)),
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            target,
            bus,
        })
    }

    pub fn value(&self) -> &str {
        &self.raw
    }
}

/// Target of a thermoregulation address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThermoTarget {
    /// `0`: all zones, also the 4-zone central unit
    All,
    /// `#0`: the 99-zone central unit
    CentralUnit99,
    Zone(u8),
    /// `#<zone>`: zone addressed through the central unit
    ZoneViaCentral(u8),
    Actuator { zone: u8, actuator: u8 },
    ExternalProbe(u8),
}

/// Thermoregulation address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereThermo {
    raw: String,
    pub target: ThermoTarget,
}

impl WhereThermo {
    pub fn parse(raw: &str) -> Result<Self> {
        const KIND: &str = "thermoregulation";

        let target = if raw == "0" {
            ThermoTarget::All
        } else if raw == "#0" {
            ThermoTarget::CentralUnit99
        } else if let Some(zone) = raw.strip_prefix('#') {
            ThermoTarget::ZoneViaCentral(number_in(zone, 1..=99, KIND, raw)?)
        } else if let Some((zone, actuator)) = raw.split_once('#') {
            ThermoTarget::Actuator {
                zone: number_in(zone, 0..=99, KIND, raw)?,
                actuator: number_in(actuator, 1..=9, KIND, raw)?,
            }
        } else if raw.len() == 3 && raw.ends_with("00") {
            ThermoTarget::ExternalProbe(number_in(&raw[..1], 1..=9, KIND, raw)?)
        } else {
            ThermoTarget::Zone(number_in(raw, 1..=99, KIND, raw)?)
        };

        Ok(Self {
            raw: raw.to_string(),
            target,
        })
    }

    /// `0` or `#0`
    pub fn is_central_unit(&self) -> bool {
        matches!(self.target, ThermoTarget::All | ThermoTarget::CentralUnit99)
    }

    pub fn value(&self) -> &str {
        &self.raw
    }
}

/// Target of a burglar alarm address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmTarget {
    CentralUnit,
    Zone(u8),
}

/// Burglar alarm address; empty or `0` is the central unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereAlarm {
    raw: String,
    pub target: AlarmTarget,
}

impl WhereAlarm {
    pub fn parse(raw: &str) -> Result<Self> {
        const KIND: &str = "alarm";

        let target = match raw {
            "" | "0" => AlarmTarget::CentralUnit,
            _ => {
                let zone = raw.strip_prefix('#').unwrap_or(raw);
                AlarmTarget::Zone(number_in(zone, 0..=99, KIND, raw)?)
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            target,
        })
    }

    pub fn value(&self) -> &str {
        &self.raw
    }
}

/// Target of an energy management address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnergyTarget {
    General,
    Meter(u8),
    Actuator(u8),
}

/// Energy management address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereEnergy {
    raw: String,
    pub target: EnergyTarget,
}

impl WhereEnergy {
    pub fn parse(raw: &str) -> Result<Self> {
        const KIND: &str = "energy";

        let target = if raw == "0" {
            EnergyTarget::General
        } else if let Some(meter) = raw.strip_prefix('5') {
            EnergyTarget::Meter(number_in(meter, 1..=255, KIND, raw)?)
        } else if let Some(actuator) = raw.strip_prefix('7').and_then(|r| r.strip_suffix("#0")) {
            EnergyTarget::Actuator(number_in(actuator, 1..=255, KIND, raw)?)
        } else {
            return Err(malformed(KIND, raw));
        };

        Ok(Self {
            raw: raw.to_string(),
            target,
        })
    }

    pub fn value(&self) -> &str {
        &self.raw
    }
}

/// ZigBee address: `<address><unit>#9`, unit being the last two digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereZigbee {
    raw: String,
    /// `None` for the general address `0#9`
    pub address: Option<u32>,
    pub unit: u8,
}

impl WhereZigbee {
    /// At least three digits before `#9`; shorter bodies are thermo actuators.
    fn looks_like(raw: &str) -> bool {
        raw.strip_suffix(ZIGBEE_SUFFIX)
            .is_some_and(|body| body.len() >= 3 && digits(body))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        const KIND: &str = "ZigBee";

        let body = raw
            .strip_suffix(ZIGBEE_SUFFIX)
            .filter(|b| digits(b))
            .ok_or_else(|| malformed(KIND, raw))?;

        if body == "0" {
            return Ok(Self {
                raw: raw.to_string(),
                address: None,
                unit: 0,
            });
        }
        if body.len() < 3 {
            return Err(malformed(KIND, raw));
        }

        let (address, unit) = body.split_at(body.len() - 2);
        Ok(Self {
            raw: raw.to_string(),
            address: Some(address.parse::<u32>().map_err(|_| malformed(KIND, raw))?),
            unit: number_in(unit, 0..=99, KIND, raw)?,
        })
    }

    /// Build from the device id reported by a product information reply.
    pub fn from_device_id(id: &str) -> Result<Self> {
        Self::parse(&format!("{id}{ZIGBEE_SUFFIX}"))
    }

    pub fn value(&self) -> &str {
        &self.raw
    }
}

/// Auxiliary channel `0..9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereAux {
    raw: String,
    pub channel: u8,
}

impl WhereAux {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != 1 {
            return Err(malformed("auxiliary", raw));
        }
        Ok(Self {
            raw: raw.to_string(),
            channel: number_in(raw, 0..=9, "auxiliary", raw)?,
        })
    }

    pub fn value(&self) -> &str {
        &self.raw
    }
}

/// Target of a scenario / CEN address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CenTarget {
    /// Plain scenario or CEN control address
    Control(u32),
    /// `2<n>`: CEN+ scenario
    CenPlus(u16),
    /// `3<n>`: dry contact / IR interface; `30` addresses all of them
    DryContact(u8),
}

/// Scenario, CEN and CEN+ address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereCen {
    raw: String,
    pub target: CenTarget,
}

impl WhereCen {
    pub fn parse(raw: &str, cen_plus: bool) -> Result<Self> {
        const KIND: &str = "scenario";

        if !digits(raw) {
            return Err(malformed(KIND, raw));
        }

        let target = if cen_plus {
            if let Some(n) = raw.strip_prefix('2') {
                CenTarget::CenPlus(number_in(n, 0..=2047, KIND, raw)?)
            } else if let Some(n) = raw.strip_prefix('3') {
                CenTarget::DryContact(number_in(n, 0..=201, KIND, raw)?)
            } else {
                return Err(malformed(KIND, raw));
            }
        } else {
            CenTarget::Control(raw.parse::<u32>().map_err(|_| malformed(KIND, raw))?)
        };

        Ok(Self {
            raw: raw.to_string(),
            target,
        })
    }

    pub fn value(&self) -> &str {
        &self.raw
    }
}
