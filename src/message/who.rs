//! WHO (function family) registry.

use std::fmt;

use crate::error::{OwnError, Result};

/// Function families known to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Who {
    Scenario,
    Lighting,
    Automation,
    LoadControl,
    Thermoregulation,
    BurglarAlarm,
    DoorEntrySystem,
    VideoDoorEntry,
    Auxiliary,
    GatewayManagement,
    LightShutterActuatorsLock,
    CenScenario,
    SoundSystem1,
    Mh200Scenario,
    EnergyManagement,
    SoundSystem2,
    LightingManagement,
    CenPlusScenario,
    Diagnostic,
    AutomationDiagnostic,
    ThermoregulationDiagnostic,
    DeviceDiagnostic,
    EnergyDiagnostic,
}

/// Grammar used to validate the WHERE section of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereGrammar {
    LightAutom,
    Thermo,
    Alarm,
    Energy,
    Auxiliary,
    Cen,
    CenPlus,
    Gateway,
}

/// `(code, family, grammar)`; a family without grammar is recognised but not implemented.
const REGISTRY: &[(u32, Who, Option<WhereGrammar>)] = &[
    (0, Who::Scenario, Some(WhereGrammar::Cen)),
    (1, Who::Lighting, Some(WhereGrammar::LightAutom)),
    (2, Who::Automation, Some(WhereGrammar::LightAutom)),
    (3, Who::LoadControl, None),
    (4, Who::Thermoregulation, Some(WhereGrammar::Thermo)),
    (5, Who::BurglarAlarm, Some(WhereGrammar::Alarm)),
    (6, Who::DoorEntrySystem, None),
    (7, Who::VideoDoorEntry, None),
    (9, Who::Auxiliary, Some(WhereGrammar::Auxiliary)),
    (13, Who::GatewayManagement, Some(WhereGrammar::Gateway)),
    (14, Who::LightShutterActuatorsLock, None),
    (15, Who::CenScenario, Some(WhereGrammar::Cen)),
    (16, Who::SoundSystem1, None),
    (17, Who::Mh200Scenario, None),
    (18, Who::EnergyManagement, Some(WhereGrammar::Energy)),
    (22, Who::SoundSystem2, None),
    (24, Who::LightingManagement, None),
    (25, Who::CenPlusScenario, Some(WhereGrammar::CenPlus)),
    (1000, Who::Diagnostic, None),
    (1001, Who::AutomationDiagnostic, None),
    (1004, Who::ThermoregulationDiagnostic, Some(WhereGrammar::Thermo)),
    (1013, Who::DeviceDiagnostic, None),
    (1018, Who::EnergyDiagnostic, Some(WhereGrammar::Energy)),
];

impl Who {
    /// Look up a family by its numeric code.
    pub fn from_code(code: u32) -> Option<Who> {
        REGISTRY
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, who, _)| *who)
    }

    /// Resolve the WHO section of a frame.
    ///
    /// Unknown codes are malformed; known families without an implementation
    /// are reported as unsupported.
    pub fn resolve(raw: &str) -> Result<(Who, WhereGrammar)> {
        let code = raw
            .parse::<u32>()
            .map_err(|_| OwnError::MalformedFrame(format!("invalid WHO: {raw}")))?;
        let (_, who, grammar) = REGISTRY
            .iter()
            .find(|(c, _, _)| *c == code)
            .ok_or_else(|| OwnError::MalformedFrame(format!("unknown WHO: {code}")))?;
        match grammar {
            Some(g) => Ok((*who, *g)),
            None => Err(OwnError::UnsupportedFrame(format!("WHO {code} ({who:?})"))),
        }
    }

    pub fn code(self) -> u32 {
        REGISTRY
            .iter()
            .find(|(_, who, _)| *who == self)
            .map(|(c, _, _)| *c)
            .unwrap_or_default()
    }

    /// Whether frames of this family can be decoded.
    pub fn is_supported(self) -> bool {
        self.grammar().is_some()
    }

    pub fn grammar(self) -> Option<WhereGrammar> {
        REGISTRY
            .iter()
            .find(|(_, who, _)| *who == self)
            .and_then(|(_, _, g)| *g)
    }
}

impl fmt::Display for Who {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
