//! Event callbacks implemented by the embedder.

use crate::connection::Connection;
use crate::error::Error;
use crate::message::{CloseCode, Message};

/// Receives connection events on the thread that drives the connection.
///
/// Callbacks run with no engine lock held, so they may call back into the
/// connection (for example to reply with [`Connection::send`]). Every method
/// has a no-op default.
///
/// For a given connection `on_open` fires at most once, before any message;
/// `on_close` fires at most once and is the last event delivered.
pub trait Handler<T, U = ()> {
    /// The opening handshake completed; the connection is OPEN.
    fn on_open(&mut self, conn: &Connection<T, U>) {
        let _ = conn;
    }

    /// A complete, validated data message arrived.
    fn on_message(&mut self, conn: &Connection<T, U>, message: Message) {
        let _ = (conn, message);
    }

    /// The connection reached CLOSED.
    ///
    /// `code` is the peer's status, [`CloseCode::NoStatusReceived`] for a
    /// close frame without one, or [`CloseCode::Abnormal`] when the transport
    /// ended without a close frame.
    fn on_close(&mut self, conn: &Connection<T, U>, code: CloseCode, reason: &str) {
        let _ = (conn, code, reason);
    }

    /// The connection failed. Always followed by `on_close`, with
    /// [`CloseCode::Abnormal`] when the opening handshake never completed.
    fn on_error(&mut self, conn: &Connection<T, U>, error: &Error) {
        let _ = (conn, error);
    }
}

/// Ignores every event.
impl<T, U> Handler<T, U> for () {}
