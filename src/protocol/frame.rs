//! WebSocket frame parsing and serialization (RFC 6455).
//!
//! Parsing is incremental: [`Frame::parse`] reports `Ok(None)` until the
//! buffer holds a whole frame, and never consumes a partial one. Header rules
//! are enforced by [`FrameValidator`] before the payload is copied.

use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask_fast, generate_mask};
use crate::protocol::validation::FrameValidator;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Raw header fields of a frame, as read from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// FIN bit.
    pub fin: bool,
    /// RSV1..RSV3 as the low three bits.
    pub rsv: u8,
    /// Opcode nibble, not yet checked.
    pub opcode: u8,
    /// Masking key, present iff the MASK bit is set.
    pub mask: Option<[u8; 4]>,
    /// Declared payload length.
    pub payload_len: u64,
    /// Width of the length field that carried `payload_len`: 7, 16 or 64.
    pub length_bits: u8,
    /// Bytes occupied by the header including the masking key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a frame header from the front of `buf`.
    ///
    /// Returns `None` if the buffer does not yet hold the whole header.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let (&byte0, rest) = buf.split_first()?;
        let &byte1 = rest.first()?;

        let fin = (byte0 & 0x80) != 0;
        let rsv = (byte0 >> 4) & 0x07;
        let opcode = byte0 & 0x0F;
        let masked = (byte1 & 0x80) != 0;

        let (payload_len, length_bits, len_end) = match byte1 & 0x7F {
            126 => {
                let ext = buf.get(2..4)?;
                (u64::from(u16::from_be_bytes([ext[0], ext[1]])), 16, 4)
            }
            127 => {
                let ext = buf.get(2..10)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(ext);
                (u64::from_be_bytes(raw), 64, 10)
            }
            short => (u64::from(short), 7, 2),
        };

        let (mask, header_len) = if masked {
            let key = buf.get(len_end..len_end + 4)?;
            (Some([key[0], key[1], key[2], key[3]]), len_end + 4)
        } else {
            (None, len_end)
        };

        Some(Self {
            fin,
            rsv,
            opcode,
            mask,
            payload_len,
            length_bits,
            header_len,
        })
    }
}

/// A WebSocket frame as defined in RFC 6455.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                     Masking key (if present)                  |
/// +---------------------------------------------------------------+
/// |                          Payload data                         |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Reserved bits RSV1..RSV3 in the low three bits. Zero on every valid frame.
    pub rsv: u8,
    /// Frame opcode defining the interpretation of payload data.
    pub opcode: OpCode,
    /// Unmasked payload data.
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given parameters.
    #[must_use]
    pub const fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv: 0,
            opcode,
            payload,
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = if let Some(code) = code {
            let mut data = code.to_be_bytes().to_vec();
            data.extend_from_slice(reason.as_bytes());
            data
        } else {
            Vec::new()
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse one frame from the front of `buf`.
    ///
    /// Returns the frame with its payload unmasked and the number of bytes
    /// consumed, or `Ok(None)` if more bytes are needed. Header violations
    /// are reported as soon as the header is complete, before the payload
    /// has arrived.
    ///
    /// # Errors
    ///
    /// Any error of [`FrameValidator::validate_header`], or
    /// `Error::Allocation` if the payload buffer cannot be reserved.
    pub fn parse(buf: &[u8], validator: &FrameValidator) -> Result<Option<(Self, usize)>> {
        let Some(header) = FrameHeader::parse(buf) else {
            return Ok(None);
        };
        let opcode = validator.validate_header(&header)?;

        // Bounded by the configured limit, which is itself a usize.
        let payload_len = usize::try_from(header.payload_len).map_err(|_| {
            Error::ProtocolViolation("payload length exceeds address space".into())
        })?;
        let total = header.header_len + payload_len;
        let Some(raw) = buf.get(header.header_len..total) else {
            return Ok(None);
        };

        let mut payload = Vec::new();
        payload
            .try_reserve_exact(payload_len)
            .map_err(|_| Error::Allocation(payload_len))?;
        payload.extend_from_slice(raw);
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }

        let frame = Frame {
            fin: header.fin,
            rsv: header.rsv,
            opcode,
            payload,
        };
        Ok(Some((frame, total)))
    }

    /// Append the wire form of this frame to `dst`.
    ///
    /// With `mask` set the MASK bit and key are written and the payload is
    /// masked in `dst`; the frame itself is left untouched. Returns the
    /// number of bytes written.
    pub fn write(&self, dst: &mut BytesMut, mask: Option<[u8; 4]>) -> usize {
        let payload_len = self.payload.len();
        let total = self.wire_size(mask.is_some());
        dst.reserve(total);

        dst.put_u8(
            u8::from(self.fin) << 7 | (self.rsv & 0x07) << 4 | self.opcode.as_u8(),
        );

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= 125 {
            dst.put_u8(mask_bit | payload_len as u8);
        } else if let Ok(len) = u16::try_from(payload_len) {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(len);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(payload_len as u64);
        }

        let start = dst.len();
        match mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = start + 4;
                dst.put_slice(&self.payload);
                apply_mask_fast(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }

        total
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}

/// Role-aware frame codec over a byte buffer.
///
/// Decoding validates against the role's inbound rules; encoding masks with a
/// fresh key per frame in the client role and writes unmasked otherwise.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    role: Role,
    validator: FrameValidator,
}

impl FrameCodec {
    /// Create a codec for `role` with the given limits.
    #[must_use]
    pub const fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            validator: FrameValidator::new(role, limits),
        }
    }

    /// The role this codec encodes and decodes for.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Decode the next complete frame from `src`, consuming its bytes.
    ///
    /// Returns `Ok(None)` and leaves `src` untouched when more bytes are needed.
    ///
    /// # Errors
    ///
    /// See [`Frame::parse`].
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match Frame::parse(src, &self.validator)? {
            Some((frame, consumed)) => {
                src.advance(consumed);
                trace!(
                    role = %self.role,
                    opcode = %frame.opcode,
                    len = frame.payload.len(),
                    fin = frame.fin,
                    "frame decoded"
                );
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    /// Encode `frame` onto the end of `dst`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a masking key cannot be drawn.
    pub fn encode(&self, frame: &Frame, dst: &mut BytesMut) -> Result<usize> {
        let mask = if self.role.must_mask() {
            Some(generate_mask()?)
        } else {
            None
        };
        let written = frame.write(dst, mask);
        trace!(
            role = %self.role,
            opcode = %frame.opcode,
            len = frame.payload.len(),
            fin = frame.fin,
            "frame encoded"
        );
        Ok(written)
    }
}
