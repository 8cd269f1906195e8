//! # wsengine - Transport-independent WebSocket protocol engine
//!
//! `wsengine` implements RFC 6455 for both client and server roles without
//! owning any I/O. The embedder hands the connection a writer for outbound
//! bytes and feeds it whatever arrives from the peer; events come back
//! through a [`Handler`].
//!
//! ## Features
//!
//! - **Incremental parsing** across arbitrary chunk boundaries
//! - **Strict validation** of masking direction, RSV bits, control frames,
//!   minimal length encoding and UTF-8
//! - **Opening and closing handshakes** with subprotocol negotiation
//! - **Auto-fragmentation** of large outbound messages
//! - **Thread-safe sending** from any thread while one thread drives input
//!
//! ## Quick Start
//!
//! ```rust
//! use wsengine::{Config, Connection, Message};
//!
//! # fn main() -> wsengine::Result<()> {
//! let server: Connection<Vec<u8>> = Connection::established(Vec::new(), Config::server())?;
//! server.send(Message::text("hello"))?;
//! assert_eq!(server.stats().frames_sent, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

pub use config::{AutoFragment, Config, Limits, Timeouts};
pub use connection::{
    Connection, ConnectionState, Flush, Handler, MessageFragmenter, Pump, Role, Statistics,
};
pub use error::{Error, ErrorKind, Result};
pub use message::{CloseCode, CloseFrame, Message, MessageType};
pub use protocol::{
    Frame, FrameCodec, HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key,
};
