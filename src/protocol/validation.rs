//! Frame header validation (RFC 6455 Section 5).
//!
//! Every inbound header passes through [`FrameValidator`] before any payload
//! byte is buffered or allocated:
//! - RSV bits must be zero (no extension is ever negotiated)
//! - reserved opcodes are rejected
//! - masking direction per RFC 6455 Section 5.1
//! - control frames are final and carry at most 125 bytes
//! - payload length uses the shortest encoding
//! - payload length within the configured limit

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Frame validator for incoming WebSocket frames.
///
/// Enforces RFC 6455 requirements based on connection role.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    /// Connection role (Client or Server).
    role: Role,
    /// Size limits for frames.
    limits: Limits,
}

impl FrameValidator {
    /// Create a new frame validator.
    #[must_use]
    pub const fn new(role: Role, limits: Limits) -> Self {
        Self { role, limits }
    }

    /// The role whose inbound frames are checked.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Validate a decoded header and resolve its opcode.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` - RSV bits set without negotiated extension
    /// - `Error::ReservedOpcode` - opcode 0x3-0x7 or 0xB-0xF
    /// - `Error::UnmaskedClientFrame` - Server received unmasked frame from client
    /// - `Error::MaskedServerFrame` - Client received masked frame from server
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge`
    /// - `Error::NonMinimalLength` / `Error::ProtocolViolation` - bad length field
    /// - `Error::PayloadTooLarge` - Frame exceeds size limit
    pub fn validate_header(&self, header: &FrameHeader) -> Result<OpCode> {
        self.validate_rsv_bits(header.rsv)?;
        let opcode = OpCode::from_u8(header.opcode)?;
        self.validate_masking(header.mask.is_some())?;

        if opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                // Saturates on 32-bit targets; the value only feeds the message.
                let len = usize::try_from(header.payload_len).unwrap_or(usize::MAX);
                return Err(Error::ControlFrameTooLarge(len));
            }
        }

        Self::validate_length_encoding(header.payload_len, header.length_bits)?;
        self.limits.check_payload_size(header.payload_len)?;

        Ok(opcode)
    }

    /// Validate masking rules per RFC 6455 Section 5.1.
    ///
    /// - Server MUST reject unmasked client frames
    /// - Client MUST reject masked server frames
    fn validate_masking(&self, masked: bool) -> Result<()> {
        match self.role {
            Role::Server if !masked => Err(Error::UnmaskedClientFrame),
            Role::Client if masked => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }

    /// RSV bits MUST be 0 unless an extension defines them.
    fn validate_rsv_bits(&self, rsv: u8) -> Result<()> {
        if rsv != 0 {
            return Err(Error::ReservedBitsSet);
        }
        Ok(())
    }

    /// Lengths must use the shortest of the 7, 16 and 64-bit forms, and the
    /// 64-bit form must leave its most significant bit clear.
    fn validate_length_encoding(len: u64, bits: u8) -> Result<()> {
        match bits {
            16 if len < 126 => Err(Error::NonMinimalLength { len, width: 16 }),
            64 if len >> 63 != 0 => Err(Error::ProtocolViolation(
                "64-bit payload length has its most significant bit set".into(),
            )),
            64 if len <= u64::from(u16::MAX) => Err(Error::NonMinimalLength { len, width: 64 }),
            _ => Ok(()),
        }
    }
}
