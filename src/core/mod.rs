//! # Core Frame Handling
//!
//! Low-level OpenWebNet frame handling: lexical validation, section splitting,
//! frame construction and stream framing.
//!
//! ## Components
//! - **Frame**: sentinels, session literals, parse/build of raw frame sections
//! - **Codec**: Tokio codec splitting a byte stream on the `##` terminator
//!
//! ## Wire Format
//! ```text
//! *WHO*WHAT*WHERE##          command
//! *#WHO*WHERE*DIM*VAL...##   dimension
//! *#*1##  *#*0##  *#*6##     ACK, NACK, BUSY NACK
//! ```

pub mod codec;
pub mod frame;
