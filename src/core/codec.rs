use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::core::frame::{FRAME_END, MAX_FRAME_LENGTH};
use crate::error::{constants, OwnError};

/// Splits a byte stream into `##`-terminated frames.
///
/// A read may carry several frames or only part of one; the decoder keeps the
/// remainder buffered and hands out complete frames in arrival order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = String;
    type Error = OwnError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Anything before the first start marker is line noise.
        match src.iter().position(|b| *b == b'*') {
            Some(0) => {}
            Some(skip) => {
                warn!(bytes = skip, "Discarding bytes before frame start");
                src.advance(skip);
            }
            None => {
                if !src.is_empty() {
                    warn!(bytes = src.len(), "Discarding bytes without frame start");
                    src.clear();
                }
                return Ok(None);
            }
        }

        let end = src
            .windows(FRAME_END.len())
            .position(|w| w == FRAME_END.as_bytes());

        match end {
            Some(pos) => {
                let raw = src.split_to(pos + FRAME_END.len());
                let frame = String::from_utf8(raw.to_vec()).map_err(|_| {
                    OwnError::MalformedFrame(constants::ERR_INVALID_CHARS.to_string())
                })?;
                trace!(%frame, "Frame decoded");
                Ok(Some(frame))
            }
            None if src.len() > MAX_FRAME_LENGTH => {
                let len = src.len();
                src.clear();
                Err(OwnError::MalformedFrame(format!(
                    "{}: {len} bytes",
                    constants::ERR_OVERSIZED_FRAME
                )))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !buf.is_empty() {
                    warn!(bytes = buf.len(), "Stream ended inside a frame");
                    buf.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for FrameCodec {
    type Error = OwnError;

    fn encode(&mut self, frame: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(frame.len());
        dst.put_slice(frame.as_bytes());
        Ok(())
    }
}
