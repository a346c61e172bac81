//! WHAT and DIM sections.

use crate::error::{OwnError, Result};

/// Prefix marking a translated command (`1000#<what>`).
pub const COMMAND_TRANSLATION: u32 = 1000;

/// Decoded WHAT section: `value[#param]*`, optionally behind `1000#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct What {
    pub value: u32,
    pub params: Vec<u32>,
    pub translated: bool,
}

impl What {
    pub fn new(value: u32) -> Self {
        Self {
            value,
            params: Vec::new(),
            translated: false,
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let numbers = split_numbers(raw, "WHAT")?;
        if numbers.len() > 1 && numbers[0] == COMMAND_TRANSLATION {
            return Ok(Self {
                value: numbers[1],
                params: numbers[2..].to_vec(),
                translated: true,
            });
        }
        Ok(Self {
            value: numbers[0],
            params: numbers[1..].to_vec(),
            translated: false,
        })
    }
}

/// Decoded DIM section; a leading `#` marks a dimension write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dim {
    pub code: u32,
    pub params: Vec<u32>,
    pub writing: bool,
}

impl Dim {
    pub fn parse(raw: &str) -> Result<Self> {
        let (writing, body) = match raw.strip_prefix('#') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let numbers = split_numbers(body, "DIM")?;
        Ok(Self {
            code: numbers[0],
            params: numbers[1..].to_vec(),
            writing,
        })
    }
}

fn split_numbers(raw: &str, section: &str) -> Result<Vec<u32>> {
    raw.split('#')
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| OwnError::MalformedFrame(format!("invalid {section}: {raw}")))
        })
        .collect()
}
