//! Message reassembly for WebSocket (RFC 6455).

use crate::config::{Config, Limits};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented WebSocket messages.
///
/// Text payloads are validated one frame at a time, so an invalid byte is
/// reported on the frame that carries it. A message is only handed out once
/// its final frame has passed every check.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: Vec<u8>,
    fragment_count: usize,
    opcode: Option<OpCode>,
    utf8: Utf8Validator,
    limits: Limits,
    validate_utf8: bool,
}

impl MessageAssembler {
    /// Create an assembler honouring the limits and UTF-8 setting of `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            buffer: Vec::new(),
            fragment_count: 0,
            opcode: None,
            utf8: Utf8Validator::new(),
            limits: config.limits.clone(),
            validate_utf8: config.validate_utf8,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns `Some(message)` when the frame carries FIN, `None` otherwise.
    /// Control frames are ignored.
    ///
    /// # Errors
    ///
    /// - `Error::UnexpectedContinuation` - continuation with nothing in progress
    /// - `Error::ExpectedContinuation` - new data opcode mid-message
    /// - `Error::MessageTooLarge` - accumulated size over the limit
    /// - `Error::InvalidUtf8` - text payload is not UTF-8
    /// - `Error::Allocation` - buffer growth failed
    ///
    /// After an error the partial message is discarded.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }
        let result = self.append(frame);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn append(&mut self, frame: Frame) -> Result<Option<Message>> {
        let opcode = match (frame.opcode, self.opcode) {
            (OpCode::Continuation, Some(current)) => current,
            (OpCode::Continuation, None) => return Err(Error::UnexpectedContinuation),
            (started, None) => {
                self.opcode = Some(started);
                started
            }
            (unexpected, Some(_)) => return Err(Error::ExpectedContinuation(unexpected.as_u8())),
        };

        let payload = frame.payload();
        let new_size = self.buffer.len() + payload.len();
        self.limits.check_message_size(new_size)?;

        if opcode == OpCode::Text && self.validate_utf8 {
            self.utf8.validate(payload, frame.fin)?;
        }

        self.buffer
            .try_reserve(payload.len())
            .map_err(|_| Error::Allocation(new_size))?;
        self.buffer.extend_from_slice(payload);
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }

        let data = std::mem::take(&mut self.buffer);
        self.reset();
        let message = match opcode {
            OpCode::Text if self.validate_utf8 => {
                Message::Text(String::from_utf8(data).map_err(|_| Error::InvalidUtf8)?)
            }
            OpCode::Text => match String::from_utf8(data) {
                Ok(text) => Message::Text(text),
                Err(e) => Message::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
            },
            _ => Message::Binary(data),
        };
        Ok(Some(message))
    }

    /// Whether a fragmented message is in progress.
    #[must_use]
    pub const fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Frames accumulated for the message in progress.
    #[must_use]
    pub const fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Bytes accumulated for the message in progress.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
        self.utf8.reset();
    }
}
