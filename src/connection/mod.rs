//! WebSocket connection management and state machine.
//!
//! [`Connection`] ties the protocol pieces together: it runs the opening
//! handshake, decodes inbound bytes into frames and messages, answers
//! control frames, and queues outbound frames for the transport.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - Opening handshake in progress
//! 2. **Open** - Messages flow both ways
//! 3. **Closing** - Close frame sent or received
//! 4. **Closed** - Terminal; the transport may be dropped
//!
//! ## Threading
//!
//! One thread feeds inbound bytes and receives [`Handler`] callbacks. Any
//! thread may send. A single lock guards the per-connection state and the
//! outbound queue, and callbacks always run with it released.

mod control;
mod fragmenter;
mod handler;
mod role;
mod state;
mod stats;
mod transport;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::Connection;
pub use fragmenter::MessageFragmenter;
pub use handler::Handler;
pub use role::Role;
pub use state::ConnectionState;
pub use stats::Statistics;
pub use transport::{Flush, Pump};
