//! Session handshake and gateway authentication.
//!
//! Every new channel goes through the same exchange before it can be used:
//!
//! ```text
//! gateway → *#*1##                      (greeting)
//! client  → *99*1## | *99*9##           (MON | CMD session request)
//! gateway → *#*1##                      → unauthenticated
//!         | *#<nonce>##                 → OPEN password
//!         | *98*1## | *98*2##           → HMAC password
//! ```
//!
//! The OPEN scheme derives a numeric response from the password and the
//! gateway nonce ([`calc_open_pass`]). The HMAC scheme exchanges SHA-256
//! digests encoded as decimal digit pairs ([`hex_to_digits`]). Both markers
//! use SHA-256 digests.
//!
//! Handshake state lives on the stack of [`negotiate`]; nothing is shared
//! between concurrent handshakes.

use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use crate::core::frame::{
    ACK, AUTH_HMAC_SHA1, AUTH_HMAC_SHA2, CMD_SESSION, CMD_SESSION_ALT, FRAME_END,
    FRAME_START_DIM, MON_SESSION, NACK,
};
use crate::error::{constants, OwnError, Result};
use crate::transport::FrameChannel;

/// Fixed HMAC identity of the client ("sope>")
const HMAC_CLIENT_ID: &str = "736F70653E";
/// Fixed HMAC identity of the gateway ("cope>")
const HMAC_SERVER_ID: &str = "636F70653E";

const HMAC_NONCE_MIN_DIGITS: usize = 80;
const HMAC_NONCE_MAX_DIGITS: usize = 128;

/// Which session a channel is opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Event (monitor) session
    Monitor,
    /// Command session
    Command,
}

impl ChannelKind {
    pub fn session_request(self) -> &'static str {
        match self {
            ChannelKind::Monitor => MON_SESSION,
            ChannelKind::Command => CMD_SESSION,
        }
    }
}

/// How the gateway authenticated the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// The client IP is trusted by the gateway
    Unauthenticated,
    /// OPEN numeric password
    Open,
    /// HMAC-SHA256 password
    Hmac,
}

/// Run the handshake on a freshly opened channel.
///
/// # Errors
/// - `MalformedHandshake` if the greeting is not ACK or a nonce is malformed
/// - `AuthenticationFailure` if the password is rejected or the gateway answers unexpectedly
/// - transport errors from the channel
#[instrument(skip(channel, password))]
pub async fn negotiate(
    channel: &mut FrameChannel,
    kind: ChannelKind,
    password: &str,
) -> Result<AuthMode> {
    let greeting = read_handshake_frame(channel).await?;
    if greeting != ACK {
        return Err(OwnError::MalformedHandshake(format!(
            "{}: {greeting}",
            constants::ERR_FIRST_FRAME_NOT_ACK
        )));
    }

    channel.write_frame(kind.session_request()).await?;
    let mut reply = read_handshake_frame(channel).await?;

    if kind == ChannelKind::Command && reply == NACK {
        debug!("Command session refused, trying alternate session request");
        channel.write_frame(CMD_SESSION_ALT).await?;
        reply = read_handshake_frame(channel).await?;
    }

    let mode = match reply.as_str() {
        ACK => AuthMode::Unauthenticated,
        AUTH_HMAC_SHA1 | AUTH_HMAC_SHA2 => {
            hmac_authenticate(channel, password).await?;
            AuthMode::Hmac
        }
        other => match nonce_digits(other) {
            Some(nonce) => {
                open_authenticate(channel, password, nonce).await?;
                AuthMode::Open
            }
            None => {
                return Err(OwnError::AuthenticationFailure(format!(
                    "unexpected session reply: {other}"
                )))
            }
        },
    };

    debug!(?mode, "Session established");
    Ok(mode)
}

/// [`negotiate`] bounded by `limit`.
///
/// On expiry the channel is closed and [`OwnError::HandshakeTimeout`] returned.
pub async fn negotiate_with_timeout(
    mut channel: FrameChannel,
    kind: ChannelKind,
    password: &str,
    limit: Duration,
) -> Result<(FrameChannel, AuthMode)> {
    let outcome = tokio::time::timeout(limit, negotiate(&mut channel, kind, password)).await;
    match outcome {
        Ok(Ok(mode)) => Ok((channel, mode)),
        Ok(Err(e)) => {
            channel.close().await;
            Err(e)
        }
        Err(_) => {
            warn!(?kind, timeout_ms = limit.as_millis() as u64, "Handshake timed out");
            channel.close().await;
            Err(OwnError::HandshakeTimeout)
        }
    }
}

async fn read_handshake_frame(channel: &mut FrameChannel) -> Result<String> {
    let frame = channel
        .read_frame()
        .await?
        .ok_or(OwnError::ConnectionClosed)?;
    debug!(%frame, "Handshake frame received");
    Ok(frame)
}

/// Digits of a `*#<digits>##` frame
fn nonce_digits(frame: &str) -> Option<&str> {
    frame
        .strip_prefix(FRAME_START_DIM)?
        .strip_suffix(FRAME_END)
        .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
}

async fn open_authenticate(channel: &mut FrameChannel, password: &str, nonce: &str) -> Result<()> {
    let response = calc_open_pass(password, nonce)?;
    channel
        .write_frame(&format!("{FRAME_START_DIM}{response}{FRAME_END}"))
        .await?;

    let reply = read_handshake_frame(channel).await?;
    if reply == ACK {
        Ok(())
    } else {
        Err(OwnError::AuthenticationFailure(
            constants::ERR_PASSWORD_REJECTED.into(),
        ))
    }
}

async fn hmac_authenticate(channel: &mut FrameChannel, password: &str) -> Result<()> {
    channel.write_frame(ACK).await?;

    let frame = read_handshake_frame(channel).await?;
    let digits = nonce_digits(&frame)
        .filter(|d| {
            (HMAC_NONCE_MIN_DIGITS..=HMAC_NONCE_MAX_DIGITS).contains(&d.len()) && d.len() % 2 == 0
        })
        .ok_or_else(|| {
            OwnError::MalformedHandshake(format!("{}: {frame}", constants::ERR_NONCE_LENGTH))
        })?;

    let exchange = HmacExchange::new(digits_to_hex(digits)?, client_nonce()?, password);
    channel
        .write_frame(&format!(
            "{FRAME_START_DIM}{}*{}{FRAME_END}",
            hex_to_digits(&exchange.rb)?,
            hex_to_digits(&exchange.client_digest())?
        ))
        .await?;

    let reply = read_handshake_frame(channel).await?;
    if reply == NACK {
        return Err(OwnError::AuthenticationFailure(
            constants::ERR_PASSWORD_REJECTED.into(),
        ));
    }
    let server_digits = nonce_digits(&reply).ok_or_else(|| {
        OwnError::MalformedHandshake(format!("unexpected HMAC reply: {reply}"))
    })?;

    if !exchange.verify_server_digest(&digits_to_hex(server_digits)?) {
        return Err(OwnError::AuthenticationFailure(
            constants::ERR_HMAC_MISMATCH.into(),
        ));
    }

    channel.write_frame(ACK).await
}

/// Lowercase hex SHA-256 of `input`
pub(crate) fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Rb: SHA-256 of `"time"` followed by the current epoch in milliseconds
fn client_nonce() -> Result<String> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .map_err(|_| OwnError::MalformedHandshake(constants::ERR_SYSTEM_TIME.into()))?;
    Ok(sha256_hex(&format!("time{millis}")))
}

/// Digests of one HMAC exchange, all lowercase hex.
#[derive(Debug, Clone)]
pub(crate) struct HmacExchange {
    pub(crate) ra: String,
    pub(crate) rb: String,
    kab: String,
}

impl HmacExchange {
    pub(crate) fn new(ra: String, rb: String, password: &str) -> Self {
        Self {
            ra,
            rb,
            kab: sha256_hex(password),
        }
    }

    /// H1 = SHA256(Ra + Rb + client id + server id + Kab)
    pub(crate) fn client_digest(&self) -> String {
        sha256_hex(&format!(
            "{}{}{HMAC_CLIENT_ID}{HMAC_SERVER_ID}{}",
            self.ra, self.rb, self.kab
        ))
    }

    /// H2 = SHA256(Ra + Rb + Kab)
    pub(crate) fn server_digest(&self) -> String {
        sha256_hex(&format!("{}{}{}", self.ra, self.rb, self.kab))
    }

    pub(crate) fn verify_server_digest(&self, received: &str) -> bool {
        self.server_digest() == received.to_ascii_lowercase()
    }
}

/// Encode a hex string as decimal digit pairs: each nibble becomes `00`..`15`.
pub fn hex_to_digits(hex: &str) -> Result<String> {
    let mut out = String::with_capacity(hex.len() * 2);
    for c in hex.chars() {
        let nibble = c
            .to_digit(16)
            .ok_or_else(|| OwnError::MalformedHandshake(format!("invalid hex digit: {c}")))?;
        out.push_str(&format!("{nibble:02}"));
    }
    Ok(out)
}

/// Decode decimal digit pairs back into a lowercase hex string.
pub fn digits_to_hex(digits: &str) -> Result<String> {
    if digits.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OwnError::MalformedHandshake(format!(
            "invalid digit encoding: {digits}"
        )));
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let value = u32::from(pair[0] - b'0') * 10 + u32::from(pair[1] - b'0');
            char::from_digit(value, 16).ok_or_else(|| {
                OwnError::MalformedHandshake(format!("digit pair out of range: {value}"))
            })
        })
        .collect()
}

/// OPEN password response for `nonce`.
///
/// Each nonce digit selects a bit transform applied to a 32-bit accumulator.
/// A nonce without any non-zero digit leaves the password unchanged.
///
/// # Errors
/// `AuthenticationFailure` if the password is not a 32-bit number,
/// `MalformedHandshake` if the nonce contains non-digits.
pub fn calc_open_pass(password: &str, nonce: &str) -> Result<String> {
    let pass = password
        .parse::<u32>()
        .map_err(|_| OwnError::AuthenticationFailure(constants::ERR_PASSWORD_NOT_NUMERIC.into()))?;

    let mut seeded = false;
    let mut n1: u32 = pass;
    let mut n2: u32 = 0;

    for c in nonce.chars() {
        let digit = c
            .to_digit(10)
            .ok_or_else(|| OwnError::MalformedHandshake(format!("invalid nonce: {nonce}")))?;
        if digit != 0 && !seeded {
            n2 = pass;
            seeded = true;
        }
        n1 = match digit {
            1 => ((n2 & 0xFFFF_FF80) >> 7).wrapping_add(n2 << 25),
            2 => ((n2 & 0xFFFF_FFF0) >> 4).wrapping_add(n2 << 28),
            3 => ((n2 & 0xFFFF_FFF8) >> 3).wrapping_add(n2 << 29),
            4 => (n2 << 1).wrapping_add(n2 >> 31),
            5 => (n2 << 5).wrapping_add(n2 >> 27),
            6 => (n2 << 12).wrapping_add(n2 >> 20),
            7 => (n2 & 0x0000_FF00)
                .wrapping_add((n2 & 0x0000_00FF) << 24)
                .wrapping_add((n2 & 0x00FF_0000) >> 16)
                .wrapping_add((n2 & 0xFF00_0000) >> 8),
            8 => ((n2 & 0x0000_FFFF) << 16)
                .wrapping_add(n2 >> 24)
                .wrapping_add((n2 & 0x00FF_0000) >> 8),
            9 => !n2,
            _ => n1,
        };
        n2 = n1;
    }

    Ok(n1.to_string())
}
