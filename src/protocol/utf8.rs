//! Streaming UTF-8 validation for WebSocket text payloads (RFC 6455).
//!
//! The validator is a small automaton that carries partial-sequence state
//! across calls, so a text message can be checked one frame at a time and a
//! multi-byte character may straddle any fragment boundary. Overlong forms,
//! surrogates (U+D800..U+DFFF) and code points above U+10FFFF are rejected as
//! soon as the offending byte is seen.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator for fragmented WebSocket messages.
#[derive(Debug, Clone)]
pub struct Utf8Validator {
    /// Continuation bytes the current sequence still needs in total.
    needed: u8,
    /// Continuation bytes of the current sequence already consumed.
    seen: u8,
    /// Inclusive bounds for the next continuation byte.
    lower: u8,
    upper: u8,
}

impl Default for Utf8Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Utf8Validator {
    /// Create a new UTF-8 validator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            needed: 0,
            seen: 0,
            lower: 0x80,
            upper: 0xBF,
        }
    }

    /// Feed the next chunk of a text payload.
    ///
    /// A sequence left unfinished at the end of `data` is remembered and
    /// completed by the next call.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` at the first byte that cannot continue a
    /// valid sequence. The validator is reset afterwards.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        if self.needed == 0 && data.is_ascii() {
            return Ok(());
        }

        for &byte in data {
            if self.needed == 0 {
                match byte {
                    0x00..=0x7F => {}
                    0xC2..=0xDF => self.needed = 1,
                    0xE0..=0xEF => {
                        match byte {
                            0xE0 => self.lower = 0xA0,
                            0xED => self.upper = 0x9F,
                            _ => {}
                        }
                        self.needed = 2;
                    }
                    0xF0..=0xF4 => {
                        match byte {
                            0xF0 => self.lower = 0x90,
                            0xF4 => self.upper = 0x8F,
                            _ => {}
                        }
                        self.needed = 3;
                    }
                    _ => return self.fail(),
                }
                continue;
            }

            if byte < self.lower || byte > self.upper {
                return self.fail();
            }
            self.lower = 0x80;
            self.upper = 0xBF;
            self.seen += 1;
            if self.seen == self.needed {
                self.needed = 0;
                self.seen = 0;
            }
        }
        Ok(())
    }

    /// Declare the end of the text.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` if a multi-byte sequence is still open.
    pub fn finish(&mut self) -> Result<()> {
        if self.has_incomplete() {
            return self.fail();
        }
        Ok(())
    }

    /// Validate a fragment of UTF-8 data.
    ///
    /// For non-final fragments (`is_final = false`), an incomplete multi-byte
    /// sequence at the end is carried into the next fragment. For final
    /// fragments all bytes must form complete sequences.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` if the data contains invalid UTF-8 sequences.
    pub fn validate(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        self.feed(data)?;
        if is_final {
            self.finish()?;
        }
        Ok(())
    }

    /// Reset the validator state, discarding any incomplete sequence.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Check if a multi-byte sequence is waiting for more bytes.
    #[must_use]
    pub const fn has_incomplete(&self) -> bool {
        self.needed != 0
    }

    fn fail(&mut self) -> Result<()> {
        self.reset();
        Err(Error::InvalidUtf8)
    }
}

/// Validate that a complete byte slice is valid UTF-8.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    Utf8Validator::new().validate(data, true)
}
