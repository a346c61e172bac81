//! # Message Model
//!
//! Typed view of OpenWebNet frames.
//!
//! [`OpenMessage::parse`] validates a frame and decodes it eagerly: the WHO is
//! resolved through the family registry, WHAT/DIM are split into numbers and
//! WHERE is checked against the grammar of its family. A message is immutable
//! once built; equality and hashing use the raw frame text.
//!
//! The family modules provide request builders and device classification:
//!
//! ```rust
//! use openwebnet::message::lighting;
//!
//! let msg = lighting::request_turn_on("0311#4#01").unwrap();
//! assert_eq!(msg.frame(), "*1*1*0311#4#01##");
//! ```

pub mod address;
pub mod device;
pub mod what;
pub mod who;

pub mod alarm;
pub mod automation;
pub mod auxiliary;
pub mod energy;
pub mod gateway;
pub mod lighting;
pub mod scenario;
pub mod thermo;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::core::frame::{self, FrameFields, FrameKind};
use crate::error::{OwnError, Result};

pub use address::Where;
pub use device::DeviceType;
pub use what::{Dim, What};
pub use who::Who;

/// The three acknowledgement literals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckKind {
    Ack,
    Nack,
    BusyNack,
}

/// Decoded fields of a command or dimension frame.
#[derive(Debug, Clone)]
struct Decoded {
    fields: FrameFields,
    who: Who,
    what: Option<What>,
    where_addr: Option<Where>,
    dim: Option<Dim>,
}

#[derive(Debug, Clone)]
enum Body {
    Ack(AckKind),
    Frame(Box<Decoded>),
}

/// An immutable, decoded OpenWebNet frame.
#[derive(Debug, Clone)]
pub struct OpenMessage {
    frame: String,
    body: Body,
}

impl OpenMessage {
    /// Parse and decode a frame.
    ///
    /// # Errors
    /// - `MalformedFrame` for lexical errors, unknown WHO or an invalid WHAT/DIM/WHERE
    /// - `UnsupportedFrame` for a known WHO this crate does not decode
    pub fn parse(text: &str) -> Result<Self> {
        let ack = match text {
            frame::ACK => Some(AckKind::Ack),
            frame::NACK => Some(AckKind::Nack),
            frame::BUSY_NACK => Some(AckKind::BusyNack),
            _ => None,
        };
        if let Some(kind) = ack {
            return Ok(Self {
                frame: text.to_string(),
                body: Body::Ack(kind),
            });
        }

        let fields = FrameFields::parse(text)?;
        let (who, grammar) = Who::resolve(&fields.who)?;

        let what = fields.what.as_deref().map(What::parse).transpose()?;
        let dim = fields.dim.as_deref().map(Dim::parse).transpose()?;
        let where_addr = fields
            .where_
            .as_deref()
            .map(|w| Where::parse(grammar, w))
            .transpose()?;

        if fields.kind == FrameKind::Dimension && where_addr.is_none() {
            return Err(OwnError::MalformedFrame(format!("missing WHERE: {text}")));
        }

        Ok(Self {
            frame: text.to_string(),
            body: Body::Frame(Box::new(Decoded {
                fields,
                who,
                what,
                where_addr,
                dim,
            })),
        })
    }

    /// `*WHO*WHAT*WHERE##`
    pub fn command(who: Who, what: u32, where_: &str) -> Result<Self> {
        Self::parse(&frame::build_command(who.code(), &what.to_string(), where_))
    }

    /// `*#WHO*WHERE##`
    pub fn status_request(who: Who, where_: &str) -> Result<Self> {
        Self::parse(&frame::build_status_request(who.code(), where_))
    }

    /// `*#WHO*WHERE*DIM##`
    pub fn dimension_request(who: Who, where_: &str, dim: u32) -> Result<Self> {
        Self::parse(&frame::build_dimension_request(
            who.code(),
            where_,
            &dim.to_string(),
        ))
    }

    /// `*#WHO*WHERE*#DIM*VAL...##`
    pub fn dimension_write(who: Who, where_: &str, dim: u32, values: &[&str]) -> Result<Self> {
        Self::parse(&frame::build_dimension_write(
            who.code(),
            where_,
            &dim.to_string(),
            values,
        ))
    }

    /// The raw frame text
    pub fn frame(&self) -> &str {
        &self.frame
    }

    pub fn ack_kind(&self) -> Option<AckKind> {
        match self.body {
            Body::Ack(kind) => Some(kind),
            Body::Frame(_) => None,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.ack_kind() == Some(AckKind::Ack)
    }

    /// NACK or BUSY NACK
    pub fn is_nack(&self) -> bool {
        matches!(self.ack_kind(), Some(AckKind::Nack | AckKind::BusyNack))
    }

    pub fn is_busy_nack(&self) -> bool {
        self.ack_kind() == Some(AckKind::BusyNack)
    }

    /// Whether this message ends a command exchange.
    pub fn is_terminal(&self) -> bool {
        self.ack_kind().is_some()
    }

    pub fn is_command(&self) -> bool {
        self.decoded()
            .is_some_and(|d| d.fields.kind == FrameKind::Command)
    }

    pub fn is_dimension(&self) -> bool {
        self.decoded()
            .is_some_and(|d| d.fields.kind == FrameKind::Dimension)
    }

    /// Status request: a dimension frame without DIM
    pub fn is_status_request(&self) -> bool {
        self.decoded()
            .is_some_and(|d| d.fields.kind == FrameKind::Dimension && d.dim.is_none())
    }

    pub fn who(&self) -> Option<Who> {
        self.decoded().map(|d| d.who)
    }

    pub fn what(&self) -> Option<&What> {
        self.decoded().and_then(|d| d.what.as_ref())
    }

    pub fn where_addr(&self) -> Option<&Where> {
        self.decoded().and_then(|d| d.where_addr.as_ref())
    }

    pub fn dim(&self) -> Option<&Dim> {
        self.decoded().and_then(|d| d.dim.as_ref())
    }

    /// Dimension values in order, leading zeros preserved
    pub fn dim_values(&self) -> &[String] {
        self.decoded()
            .map(|d| d.fields.values.as_slice())
            .unwrap_or(&[])
    }

    /// Raw sections, `None` for acknowledgements
    pub fn fields(&self) -> Option<&FrameFields> {
        self.decoded().map(|d| &d.fields)
    }

    fn decoded(&self) -> Option<&Decoded> {
        match &self.body {
            Body::Frame(d) => Some(d),
            Body::Ack(_) => None,
        }
    }
}

impl PartialEq for OpenMessage {
    fn eq(&self, other: &Self) -> bool {
        self.frame == other.frame
    }
}

impl Eq for OpenMessage {}

impl Hash for OpenMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.frame.hash(state);
    }
}

impl fmt::Display for OpenMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.frame)
    }
}

impl FromStr for OpenMessage {
    type Err = OwnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
