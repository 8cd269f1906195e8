//! Outcomes of moving bytes between the engine and the embedder's transport.

use std::io::{self, Read, Write};

use bytes::{Buf, BytesMut};

use crate::error::Result;

/// Result of pushing queued outbound bytes to the transport.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Every queued byte was accepted by the transport.
    Complete,
    /// The transport would block; the rest stays queued for the next flush.
    Pending,
}

impl Flush {
    /// Check if bytes are still waiting to be written.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Flush::Pending)
    }
}

/// Result of one read step of the inbound pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    /// This many bytes were read and fed to the engine.
    Read(usize),
    /// The transport has nothing to read right now.
    WouldBlock,
    /// The transport reached end of stream, or the connection is CLOSED.
    Closed,
}

/// Write as much of `queue` as the transport accepts, consuming what was written.
///
/// `Interrupted` is retried; `WouldBlock` stops the loop and reports
/// [`Flush::Pending`].
pub(crate) fn write_queued<W: Write>(transport: &mut W, queue: &mut BytesMut) -> Result<Flush> {
    while !queue.is_empty() {
        match transport.write(queue) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "transport accepted no bytes",
                )
                .into());
            }
            Ok(n) => queue.advance(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Flush::Pending),
            Err(e) => return Err(e.into()),
        }
    }

    loop {
        match transport.flush() {
            Ok(()) => return Ok(Flush::Complete),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Flush::Pending),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Outcome of a single read attempt.
pub(crate) enum ReadStep {
    Data(usize),
    WouldBlock,
    Eof,
}

/// Read once into `buf`, retrying `Interrupted`.
///
/// `TimedOut` is treated like `WouldBlock`, which is what blocking sockets
/// with a read timeout report.
pub(crate) fn read_once<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<ReadStep> {
    loop {
        match reader.read(buf) {
            Ok(0) => return Ok(ReadStep::Eof),
            Ok(n) => return Ok(ReadStep::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(ReadStep::WouldBlock);
            }
            Err(e) => return Err(e),
        }
    }
}
