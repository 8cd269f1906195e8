//! Control frame interpretation (RFC 6455 Section 5.5).
//!
//! Size and fragmentation rules for control frames are enforced by the frame
//! validator; this module reads their payloads.

use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::{Frame, MAX_CONTROL_FRAME_PAYLOAD, OpCode, validate_utf8};

/// A decoded control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Control {
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// `None` when the peer sent no status code.
    Close(Option<CloseFrame>),
}

impl Control {
    /// Interpret a control frame.
    ///
    /// # Errors
    ///
    /// See [`parse_close_payload`]. Data frames are reported as a protocol
    /// violation.
    pub(crate) fn from_frame(frame: Frame, strict_utf8: bool) -> Result<Self> {
        match frame.opcode {
            OpCode::Ping => Ok(Control::Ping(frame.into_payload())),
            OpCode::Pong => Ok(Control::Pong(frame.into_payload())),
            OpCode::Close => {
                parse_close_payload(frame.payload(), strict_utf8).map(Control::Close)
            }
            other => Err(Error::ProtocolViolation(format!(
                "{other} is not a control frame"
            ))),
        }
    }
}

/// Parse the payload of a received close frame.
///
/// An empty payload carries no status. Otherwise the first two bytes are a
/// big-endian code and the rest a UTF-8 reason.
///
/// # Errors
///
/// - `Error::ProtocolViolation` for a one-byte payload
/// - `Error::InvalidCloseCode` for a code outside the sendable ranges
/// - `Error::InvalidUtf8` for a malformed reason when `validate_reason` is set
pub(crate) fn parse_close_payload(
    payload: &[u8],
    validate_reason: bool,
) -> Result<Option<CloseFrame>> {
    match payload {
        [] => Ok(None),
        [_] => Err(Error::ProtocolViolation("close payload of one byte".into())),
        [hi, lo, reason @ ..] => {
            let code = CloseCode::from_u16(u16::from_be_bytes([*hi, *lo]));
            if !code.is_valid() {
                return Err(Error::InvalidCloseCode(code.as_u16()));
            }
            if validate_reason {
                validate_utf8(reason)?;
            }
            Ok(Some(CloseFrame::new(code, String::from_utf8_lossy(reason))))
        }
    }
}

/// Check a close the embedder asked to send.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` for a reserved or out-of-range code, or
/// a reason longer than [`CloseFrame::MAX_REASON_LEN`] bytes.
pub(crate) fn check_outgoing_close(code: CloseCode, reason: &str) -> Result<()> {
    if code.is_reserved() || !code.is_valid() {
        return Err(Error::InvalidParameter(format!(
            "close code {} may not be sent",
            code.as_u16()
        )));
    }
    if reason.len() > CloseFrame::MAX_REASON_LEN {
        return Err(Error::InvalidParameter(format!(
            "close reason is {} bytes (max: {})",
            reason.len(),
            CloseFrame::MAX_REASON_LEN
        )));
    }
    Ok(())
}

/// Check a ping or pong payload the embedder asked to send.
pub(crate) fn check_outgoing_control(payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
        return Err(Error::InvalidParameter(format!(
            "control payload is {} bytes (max: {MAX_CONTROL_FRAME_PAYLOAD})",
            payload.len()
        )));
    }
    Ok(())
}
