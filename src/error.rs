//! Error types for the WebSocket protocol engine.
//!
//! [`Error`] carries the detailed cause of a failure, [`ErrorKind`] is the
//! stable taxonomy every failure is classified into.

use std::fmt;

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Generic protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in a text message or close reason.
    #[error("Invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// Reserved bits set without a negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame with FIN=0.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload larger than 125 bytes.
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Payload length not encoded in the shortest form.
    #[error("Non-minimal length encoding: {len} bytes in a {width}-bit field")]
    NonMinimalLength {
        /// Declared payload length.
        len: u64,
        /// Width of the length field that was used.
        width: u8,
    },

    /// Unmasked frame received by a server.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked frame received by a client.
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Continuation frame with no message in progress.
    #[error("Unexpected continuation frame")]
    UnexpectedContinuation,

    /// New data frame while a fragmented message is in progress.
    #[error("Expected continuation frame, got {0:#x}")]
    ExpectedContinuation(u8),

    /// Invalid close code received or requested.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Declared frame payload exceeds the configured maximum.
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge {
        /// Declared or requested size.
        size: u64,
        /// Configured maximum.
        max: usize,
    },

    /// Reassembled message exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Accumulated size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Malformed or unacceptable upgrade request/response.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake header block exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Buffered size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Server did not accept the upgrade.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// `Sec-WebSocket-Accept` does not match the key that was sent.
    #[error("Sec-WebSocket-Accept mismatch: expected {expected}, received {received}")]
    AcceptKeyMismatch {
        /// Value derived from our key.
        expected: String,
        /// Value the server sent.
        received: String,
    },

    /// Operation not permitted in the current connection state.
    #[error("Invalid state: operation not permitted while {0}")]
    InvalidState(ConnectionState),

    /// Caller supplied an unusable argument or configuration.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Buffer allocation failed.
    #[error("Allocation of {0} bytes failed")]
    Allocation(usize),

    /// TLS layer failure reported by the embedder's transport.
    #[error("TLS failure: {0}")]
    Tls(String),

    /// Certificate validation failure reported by the embedder's transport.
    #[error("Certificate validation failed: {0}")]
    CertValidation(String),

    /// I/O error from the transport.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Stable classification of every [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A buffer could not be allocated.
    AllocationFailure,
    /// An argument or configuration value was rejected.
    InvalidParameter,
    /// The opening handshake was refused.
    ConnectFailed,
    /// The TLS layer failed.
    TlsFailure,
    /// The peer certificate was rejected.
    CertValidationFailed,
    /// The peer broke RFC 6455.
    ProtocolViolation,
    /// A frame or message exceeded the configured maximum.
    PayloadTooLarge,
    /// The connection state forbids the operation.
    InvalidState,
    /// The transport failed.
    IoError,
}

impl ErrorKind {
    /// Stable, human-readable description of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::AllocationFailure => "allocation failure",
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::ConnectFailed => "connect failed",
            ErrorKind::TlsFailure => "TLS failure",
            ErrorKind::CertValidationFailed => "certificate validation failed",
            ErrorKind::ProtocolViolation => "protocol violation",
            ErrorKind::PayloadTooLarge => "payload too large",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::IoError => "I/O error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::ProtocolViolation(_)
            | Error::InvalidUtf8
            | Error::ReservedBitsSet
            | Error::ReservedOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::NonMinimalLength { .. }
            | Error::UnmaskedClientFrame
            | Error::MaskedServerFrame
            | Error::UnexpectedContinuation
            | Error::ExpectedContinuation(_)
            | Error::InvalidCloseCode(_)
            | Error::InvalidHandshake(_)
            | Error::HandshakeTooLarge { .. }
            | Error::AcceptKeyMismatch { .. } => ErrorKind::ProtocolViolation,
            Error::PayloadTooLarge { .. } | Error::MessageTooLarge { .. } => {
                ErrorKind::PayloadTooLarge
            }
            Error::ConnectFailed(_) => ErrorKind::ConnectFailed,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Error::Allocation(_) => ErrorKind::AllocationFailure,
            Error::Tls(_) => ErrorKind::TlsFailure,
            Error::CertValidation(_) => ErrorKind::CertValidationFailed,
            Error::Io(_) => ErrorKind::IoError,
        }
    }

    /// Close status that reports this error to the peer.
    ///
    /// Transport failures map to [`CloseCode::Abnormal`], which is never put
    /// on the wire.
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Error::InvalidUtf8 => CloseCode::InvalidPayload,
            Error::PayloadTooLarge { .. } | Error::MessageTooLarge { .. } => {
                CloseCode::MessageTooBig
            }
            Error::Allocation(_) | Error::InvalidParameter(_) | Error::InvalidState(_) => {
                CloseCode::InternalError
            }
            Error::Io(_) | Error::Tls(_) | Error::CertValidation(_) => CloseCode::Abnormal,
            _ => CloseCode::ProtocolError,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
