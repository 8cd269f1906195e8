//! Shared fixtures for the integration tests.
//!
//! [`Wire`] is an in-memory transport that several threads may write to, and
//! [`Recorder`] logs every callback so tests can assert on the exact event
//! sequence a connection produced.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use wsengine::{
    CloseCode, Config, Connection, Error, ErrorKind, Frame, FrameCodec, Handler, Limits, Message,
    Role,
};

/// Outbound transport backed by a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct Wire(Arc<Mutex<Vec<u8>>>);

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything written so far.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

impl Write for Wire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One recorded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Text(String),
    Binary(Vec<u8>),
    Close(u16, String),
    Error(ErrorKind),
}

/// Handler that records every callback in order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    pub errors: Vec<Error>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Text(_) | Event::Binary(_)))
            .cloned()
            .collect()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Close(code, reason) => Some((*code, reason.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn error_kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(Error::kind).collect()
    }
}

impl<T, U> Handler<T, U> for Recorder {
    fn on_open(&mut self, _: &Connection<T, U>) {
        self.events.push(Event::Open);
    }

    fn on_message(&mut self, _: &Connection<T, U>, message: Message) {
        self.events.push(match message {
            Message::Text(text) => Event::Text(text),
            Message::Binary(data) => Event::Binary(data),
            _ => unreachable!("unknown message kind"),
        });
    }

    fn on_close(&mut self, _: &Connection<T, U>, code: CloseCode, reason: &str) {
        self.events.push(Event::Close(code.as_u16(), reason.to_string()));
    }

    fn on_error(&mut self, _: &Connection<T, U>, error: &Error) {
        self.events.push(Event::Error(error.kind()));
        self.errors.push(error.clone());
    }
}

/// A connection with its transport and event log.
pub struct Peer {
    pub conn: Connection<Wire>,
    pub wire: Wire,
    pub log: Recorder,
}

impl Peer {
    pub fn server(config: Config) -> Self {
        let wire = Wire::new();
        Self {
            conn: Connection::server(wire.clone(), config).unwrap(),
            wire,
            log: Recorder::new(),
        }
    }

    pub fn client(config: Config) -> Self {
        let wire = Wire::new();
        Self {
            conn: Connection::client(wire.clone(), config, "localhost:9001", "/chat").unwrap(),
            wire,
            log: Recorder::new(),
        }
    }

    /// Feed raw bytes as if they came from the peer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.conn.feed(bytes, &mut self.log).unwrap();
    }

    /// Move everything `from` has written into this connection.
    pub fn receive_from(&mut self, from: &Peer) {
        let bytes = from.wire.take();
        self.feed(&bytes);
    }
}

/// Client and server with a completed opening handshake.
pub fn connected_pair(client: Config, server: Config) -> (Peer, Peer) {
    let mut client = Peer::client(client);
    let mut server = Peer::server(server);
    server.receive_from(&client);
    client.receive_from(&server);
    assert!(client.conn.is_open(), "client did not open: {:?}", client.log.events);
    assert!(server.conn.is_open(), "server did not open: {:?}", server.log.events);
    (client, server)
}

/// Encode frames the way `role` would put them on the wire.
pub fn encode_as(role: Role, frames: &[Frame]) -> Vec<u8> {
    let codec = FrameCodec::new(role, Limits::default());
    let mut buf = BytesMut::new();
    for frame in frames {
        codec.encode(frame, &mut buf).unwrap();
    }
    buf.to_vec()
}

/// Decode every frame in bytes written by `role`.
pub fn decode_from(role: Role, bytes: &[u8]) -> Vec<Frame> {
    let codec = FrameCodec::new(role.peer(), Limits::default());
    let mut buf = BytesMut::from(bytes);
    let mut frames = Vec::new();
    while let Some(frame) = codec.decode(&mut buf).unwrap() {
        frames.push(frame);
    }
    assert!(buf.is_empty(), "{} trailing bytes", buf.len());
    frames
}
