//! # Protocol Layer
//!
//! Session handshake, command responses and listener dispatch.
//!
//! ## Components
//! - **Handshake**: session request and OPEN / HMAC authentication
//! - **Response**: correlation of replies to a request
//! - **Dispatcher**: ordered delivery of session events to listeners

pub mod dispatcher;
pub mod handshake;
pub mod response;

pub use dispatcher::{GatewayEvent, GatewayListener, Notifier};
pub use handshake::{negotiate, negotiate_with_timeout, AuthMode, ChannelKind};
pub use response::Response;
