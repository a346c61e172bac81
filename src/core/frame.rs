//! Lexical layer of the OpenWebNet wire format.
//!
//! A frame is an ASCII string over the alphabet `0-9 # *`, opened by `*` and
//! closed by `##`. Two shapes exist:
//!
//! ```text
//! command    *WHO*WHAT*WHERE##
//! dimension  *#WHO*WHERE##                  (status request)
//!            *#WHO*WHERE*DIM*VAL1*...*VALn##  (dimension request / reply)
//!            *#WHO*WHERE*#DIM*VAL1*...##      (dimension write)
//! ```
//!
//! [`FrameFields`] keeps every section exactly as received so that
//! `FrameFields::parse(f)?.build() == f` holds for every valid frame.

use crate::error::{constants, OwnError, Result};

/// Frame terminator
pub const FRAME_END: &str = "##";
/// Command frame start marker
pub const FRAME_START: &str = "*";
/// Dimension frame start marker
pub const FRAME_START_DIM: &str = "*#";

/// Positive acknowledgement
pub const ACK: &str = "*#*1##";
/// Negative acknowledgement
pub const NACK: &str = "*#*0##";
/// Gateway busy
pub const BUSY_NACK: &str = "*#*6##";

/// Session request for the event (monitor) channel
pub const MON_SESSION: &str = "*99*1##";
/// Session request for the command channel
pub const CMD_SESSION: &str = "*99*9##";
/// Alternate command session request, used when the gateway refuses [`CMD_SESSION`]
pub const CMD_SESSION_ALT: &str = "*99*0##";

/// HMAC authentication requested with SHA-1 nonces
pub const AUTH_HMAC_SHA1: &str = "*98*1##";
/// HMAC authentication requested with SHA-256 nonces
pub const AUTH_HMAC_SHA2: &str = "*98*2##";

/// Longest frame accepted from a gateway
pub const MAX_FRAME_LENGTH: usize = 1024;

/// Whether a frame is a command or a dimension frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Command,
    Dimension,
}

/// Raw sections of a frame, exactly as they appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameFields {
    pub kind: FrameKind,
    pub who: String,
    /// WHAT section, command frames only
    pub what: Option<String>,
    /// WHERE section; `Some("")` when present but empty
    pub where_: Option<String>,
    /// DIM section including a leading `#` for dimension writes
    pub dim: Option<String>,
    /// Dimension values, in order
    pub values: Vec<String>,
}

/// Check the characters, start marker and terminator of a frame.
pub fn validate(text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(OwnError::MalformedFrame(constants::ERR_EMPTY_FRAME.into()));
    }
    if !text.ends_with(FRAME_END) {
        return Err(OwnError::MalformedFrame(format!(
            "{}: {text}",
            constants::ERR_MISSING_TERMINATOR
        )));
    }
    if !text.starts_with(FRAME_START) {
        return Err(OwnError::MalformedFrame(format!(
            "{}: {text}",
            constants::ERR_MISSING_START
        )));
    }
    if !text.bytes().all(|b| b.is_ascii_digit() || b == b'#' || b == b'*') {
        return Err(OwnError::MalformedFrame(format!(
            "{}: {text}",
            constants::ERR_INVALID_CHARS
        )));
    }
    Ok(())
}

/// True for the three fixed acknowledgement literals.
pub fn is_ack_literal(text: &str) -> bool {
    text == ACK || text == NACK || text == BUSY_NACK
}

impl FrameFields {
    /// Split a frame into its raw sections.
    ///
    /// The acknowledgement literals are not field frames and are rejected here;
    /// `OpenMessage::parse` handles them before reaching this point.
    pub fn parse(text: &str) -> Result<Self> {
        validate(text)?;
        if text.len() < FRAME_START_DIM.len() + FRAME_END.len() {
            return Err(OwnError::MalformedFrame(format!(
                "{}: {text}",
                constants::ERR_TOO_FEW_SECTIONS
            )));
        }

        let (kind, body) = if text.starts_with(FRAME_START_DIM) {
            (
                FrameKind::Dimension,
                &text[FRAME_START_DIM.len()..text.len() - FRAME_END.len()],
            )
        } else {
            (
                FrameKind::Command,
                &text[FRAME_START.len()..text.len() - FRAME_END.len()],
            )
        };

        let parts: Vec<&str> = body.split('*').collect();
        if parts.iter().filter(|p| !p.is_empty()).count() < 2 {
            return Err(OwnError::MalformedFrame(format!(
                "{}: {text}",
                constants::ERR_TOO_FEW_SECTIONS
            )));
        }
        if parts[0].is_empty() {
            return Err(OwnError::MalformedFrame(format!("missing WHO: {text}")));
        }

        match kind {
            FrameKind::Command => {
                if parts.len() > 3 {
                    return Err(OwnError::MalformedFrame(format!(
                        "too many sections in command frame: {text}"
                    )));
                }
                if parts[1].is_empty() {
                    return Err(OwnError::MalformedFrame(format!("missing WHAT: {text}")));
                }
                Ok(Self {
                    kind,
                    who: parts[0].to_string(),
                    what: Some(parts[1].to_string()),
                    where_: parts.get(2).map(|w| w.to_string()),
                    dim: None,
                    values: Vec::new(),
                })
            }
            FrameKind::Dimension => {
                let dim = parts.get(2).map(|d| d.to_string());
                if let Some(d) = &dim {
                    if d.trim_start_matches('#').is_empty() {
                        return Err(OwnError::MalformedFrame(format!("empty DIM: {text}")));
                    }
                }
                Ok(Self {
                    kind,
                    who: parts[0].to_string(),
                    what: None,
                    where_: parts.get(1).map(|w| w.to_string()),
                    dim,
                    values: parts.iter().skip(3).map(|v| v.to_string()).collect(),
                })
            }
        }
    }

    /// Render the sections back into a frame.
    pub fn build(&self) -> String {
        let mut out = String::with_capacity(32);
        match self.kind {
            FrameKind::Command => {
                out.push_str(FRAME_START);
                out.push_str(&self.who);
                if let Some(what) = &self.what {
                    out.push('*');
                    out.push_str(what);
                }
                if let Some(w) = &self.where_ {
                    out.push('*');
                    out.push_str(w);
                }
            }
            FrameKind::Dimension => {
                out.push_str(FRAME_START_DIM);
                out.push_str(&self.who);
                if let Some(w) = &self.where_ {
                    out.push('*');
                    out.push_str(w);
                }
                if let Some(dim) = &self.dim {
                    out.push('*');
                    out.push_str(dim);
                }
                for value in &self.values {
                    out.push('*');
                    out.push_str(value);
                }
            }
        }
        out.push_str(FRAME_END);
        out
    }
}

/// `*WHO*WHAT*WHERE##`
pub fn build_command(who: u32, what: &str, where_: &str) -> String {
    format!("*{who}*{what}*{where_}##")
}

/// `*#WHO*WHERE##`
pub fn build_status_request(who: u32, where_: &str) -> String {
    format!("*#{who}*{where_}##")
}

/// `*#WHO*WHERE*DIM##`
pub fn build_dimension_request(who: u32, where_: &str, dim: &str) -> String {
    format!("*#{who}*{where_}*{dim}##")
}

/// `*#WHO*WHERE*#DIM*VAL1*...##`
pub fn build_dimension_write(who: u32, where_: &str, dim: &str, values: &[&str]) -> String {
    let mut frame = format!("*#{who}*{where_}*#{dim}");
    for value in values {
        frame.push('*');
        frame.push_str(value);
    }
    frame.push_str(FRAME_END);
    frame
}
