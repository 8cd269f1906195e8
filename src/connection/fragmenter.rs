//! Auto-fragmentation of outgoing data messages (RFC 6455 Section 5.4).

use crate::config::AutoFragment;
use crate::protocol::{Frame, OpCode};

/// Iterator that splits a message payload into frames.
///
/// The first frame carries the message opcode, later ones
/// `OpCode::Continuation`; only the last has FIN set. No frame carries more
/// than `fragment_size` payload bytes. An empty payload yields one empty
/// final frame.
#[derive(Debug)]
pub struct MessageFragmenter<'a> {
    payload: &'a [u8],
    opcode: OpCode,
    fragment_size: usize,
    offset: usize,
    started: bool,
}

impl<'a> MessageFragmenter<'a> {
    /// Split `payload` into frames of at most `fragment_size` bytes.
    #[inline]
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            payload,
            opcode,
            fragment_size: fragment_size.max(1),
            offset: 0,
            started: false,
        }
    }

    /// Fragmenter following the connection's auto-fragment setting: a single
    /// frame when disabled.
    #[must_use]
    pub fn with_policy(payload: &'a [u8], opcode: OpCode, policy: AutoFragment) -> Self {
        let size = policy.fragment_size().unwrap_or(payload.len());
        Self::new(payload, opcode, size)
    }

    /// Check if more than one frame will be produced.
    #[inline]
    #[must_use]
    pub fn needs_fragmentation(&self) -> bool {
        self.payload.len() > self.fragment_size
    }

    /// Payload bytes not yet emitted.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.payload.len().saturating_sub(self.offset)
    }
}

impl Iterator for MessageFragmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.started && self.offset >= self.payload.len() {
            return None;
        }

        let end = self.payload.len().min(self.offset + self.fragment_size);
        let chunk = self.payload[self.offset..end].to_vec();
        self.offset = end;

        let opcode = if self.started {
            OpCode::Continuation
        } else {
            self.started = true;
            self.opcode
        };

        Some(Frame::new(end == self.payload.len(), opcode, chunk))
    }
}
