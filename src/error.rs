//! # Error Types
//!
//! Error taxonomy for the OpenWebNet client.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! [`OwnError`]. The variants are grouped so that callers can decide what to do
//! without inspecting message strings:
//!
//! ## Error Categories
//! - **Frame errors**: `MalformedFrame` (syntax or grammar violation, never retried)
//!   and `UnsupportedFrame` (recognised but not implemented, safe to ignore)
//! - **Authentication errors**: `AuthenticationFailure` and `MalformedHandshake`.
//!   Fatal for the current connect or reconnect attempt.
//! - **Transport errors**: `Io`, `Transport`, `Timeout`, `HandshakeTimeout` and
//!   `ConnectionClosed`. Retried according to the session policy.
//! - **Protocol errors**: `ProtocolViolation`, raised by non-conformant gateways.
//!
//! ## Example Usage
//! ```rust
//! use openwebnet::error::OwnError;
//! use openwebnet::message::OpenMessage;
//! use tracing::{error, info};
//!
//! match OpenMessage::parse("*1*1*12") {
//!     Ok(msg) => info!(frame = %msg, "parsed"),
//!     Err(OwnError::MalformedFrame(reason)) => error!(%reason, "bad frame"),
//!     Err(e) => error!(error = %e, "unexpected"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Frame validation errors
    pub const ERR_EMPTY_FRAME: &str = "frame is empty";
    pub const ERR_MISSING_TERMINATOR: &str = "frame does not end with ##";
    pub const ERR_MISSING_START: &str = "frame does not start with *";
    pub const ERR_INVALID_CHARS: &str = "frame contains characters other than 0-9, # and *";
    pub const ERR_TOO_FEW_SECTIONS: &str = "frame has fewer than two non-empty sections";
    pub const ERR_OVERSIZED_FRAME: &str = "partial frame exceeds maximum length";

    /// Connection errors
    pub const ERR_CONNECT_TIMEOUT: &str = "Connect timed out";
    pub const ERR_STALE_REPLY: &str = "reply received after its exchange completed";

    /// Handshake errors
    pub const ERR_FIRST_FRAME_NOT_ACK: &str = "gateway did not open with ACK";
    pub const ERR_PASSWORD_REJECTED: &str = "gateway rejected the password";
    pub const ERR_PASSWORD_NOT_NUMERIC: &str = "OPEN password must be numeric";
    pub const ERR_NONCE_LENGTH: &str = "HMAC nonce must have 80 to 128 digits";
    pub const ERR_HMAC_MISMATCH: &str = "gateway HMAC does not match";
    pub const ERR_SYSTEM_TIME: &str = "System time error: time went backwards";

    /// Lock errors
    pub const ERR_LISTENERS_WRITE_LOCK: &str = "Failed to acquire write lock on listeners";
    pub const ERR_LISTENERS_READ_LOCK: &str = "Failed to acquire read lock on listeners";
}

/// OwnError is the primary error type for all OpenWebNet operations
#[derive(Error, Debug)]
pub enum OwnError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(String),

    #[error("Malformed handshake: {0}")]
    MalformedHandshake(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("A discovery is already in progress")]
    DiscoveryInProgress,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl OwnError {
    /// Transport-level failure: I/O, timeouts and dropped connections.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            OwnError::Io(_)
                | OwnError::Transport(_)
                | OwnError::Timeout
                | OwnError::HandshakeTimeout
                | OwnError::ConnectionClosed
        )
    }

    /// Authentication-level failure. These never lead to a retry.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            OwnError::AuthenticationFailure(_) | OwnError::MalformedHandshake(_)
        )
    }

    /// Whether the reconnect loop should keep trying after this error.
    pub fn is_retryable(&self) -> bool {
        self.is_transport()
    }
}

impl Clone for OwnError {
    fn clone(&self) -> Self {
        match self {
            OwnError::Io(e) => OwnError::Io(io::Error::new(e.kind(), e.to_string())),
            OwnError::MalformedFrame(s) => OwnError::MalformedFrame(s.clone()),
            OwnError::UnsupportedFrame(s) => OwnError::UnsupportedFrame(s.clone()),
            OwnError::MalformedHandshake(s) => OwnError::MalformedHandshake(s.clone()),
            OwnError::AuthenticationFailure(s) => OwnError::AuthenticationFailure(s.clone()),
            OwnError::HandshakeTimeout => OwnError::HandshakeTimeout,
            OwnError::Transport(s) => OwnError::Transport(s.clone()),
            OwnError::Timeout => OwnError::Timeout,
            OwnError::ConnectionClosed => OwnError::ConnectionClosed,
            OwnError::ProtocolViolation(s) => OwnError::ProtocolViolation(s.clone()),
            OwnError::DiscoveryInProgress => OwnError::DiscoveryInProgress,
            OwnError::Cancelled => OwnError::Cancelled,
            OwnError::ConfigError(s) => OwnError::ConfigError(s.clone()),
        }
    }
}

impl From<tokio_serial::Error> for OwnError {
    fn from(e: tokio_serial::Error) -> Self {
        OwnError::Transport(format!("serial port: {e}"))
    }
}

/// Type alias for Results using OwnError
pub type Result<T> = std::result::Result<T, OwnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(OwnError::Timeout.is_transport());
        assert!(OwnError::Io(io::Error::other("boom")).is_retryable());
        assert!(OwnError::HandshakeTimeout.is_retryable());
        assert!(OwnError::MalformedHandshake("x".into()).is_authentication());
        assert!(!OwnError::AuthenticationFailure("x".into()).is_retryable());
        assert!(!OwnError::MalformedFrame("x".into()).is_transport());
    }

    #[test]
    fn test_clone_keeps_category() {
        let io = OwnError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        match io.clone() {
            OwnError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {other:?}"),
        }
        assert!(OwnError::AuthenticationFailure("x".into()).clone().is_authentication());
    }
}
