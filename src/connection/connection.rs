use std::io::{Read, Write};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::connection::control::{self, Control};
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::stats::{Statistics, StatsTracker};
use crate::connection::transport::{self, Flush, Pump, ReadStep};
use crate::connection::{ConnectionState, Handler, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::handshake::find_header_end;
use crate::protocol::{
    Frame, FrameCodec, HandshakeRequest, HandshakeResponse, MessageAssembler, OpCode, Rejection,
};

/// Bytes requested from the transport per read in [`Connection::pump`].
const READ_CHUNK: usize = 8192;

/// A WebSocket connection driven by the embedder.
///
/// The engine performs no I/O of its own beyond writing to the transport it
/// was given. Inbound bytes are handed in with [`feed`](Self::feed) (or read
/// from a [`Read`] with [`pump`](Self::pump) and [`run`](Self::run)) on one
/// driving thread; sends may come from any thread.
///
/// ## Type Parameters
///
/// - `T`: the outbound transport. `&TcpStream` works, leaving the socket
///   owned by the embedder.
/// - `U`: embedder data associated through [`set_user_data`](Self::set_user_data).
///   Only a weak reference is kept.
///
/// ## Example
///
/// ```rust,no_run
/// use std::net::TcpStream;
/// use wsengine::{Config, Connection, Handler, Message};
///
/// struct Echo;
///
/// impl<'a> Handler<&'a TcpStream> for Echo {
///     fn on_message(&mut self, conn: &Connection<&'a TcpStream>, message: Message) {
///         let _ = conn.send(message);
///     }
/// }
///
/// # fn main() -> wsengine::Result<()> {
/// let stream = TcpStream::connect("localhost:9001")?;
/// let conn = Connection::client(&stream, Config::client(), "localhost:9001", "/")?;
/// conn.run(&mut &stream, &mut Echo)?;
/// # Ok(())
/// # }
/// ```
pub struct Connection<T, U = ()> {
    inner: Mutex<Inner<T>>,
    stats: Arc<StatsTracker>,
    user_data: Mutex<Weak<U>>,
    role: Role,
}

/// Progress of the opening handshake.
enum Handshake {
    AwaitRequest,
    AwaitResponse(HandshakeRequest),
    Done,
}

/// Callback produced under the lock, delivered after it is released.
enum Event {
    Open,
    Message(Message),
    Close(CloseCode, String),
    Error(Error),
}

struct Inner<T> {
    transport: T,
    config: Config,
    state: ConnectionState,
    handshake: Handshake,
    codec: FrameCodec,
    assembler: MessageAssembler,
    read_buf: BytesMut,
    outbound: BytesMut,
    protocol: Option<String>,
    started_at: Instant,
    closing_since: Option<Instant>,
    ping_sent_at: Option<Instant>,
    close_sent: bool,
    close_notified: bool,
    events: Vec<Event>,
    stats: Arc<StatsTracker>,
}

impl<T, U> Connection<T, U> {
    fn from_inner(inner: Inner<T>) -> Self {
        Self {
            role: inner.codec.role(),
            stats: Arc::clone(&inner.stats),
            inner: Mutex::new(inner),
            user_data: Mutex::new(Weak::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Check if the connection is OPEN.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// The role this endpoint plays.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The subprotocol agreed during the handshake, if any.
    pub fn protocol(&self) -> Option<String> {
        self.lock().protocol.clone()
    }

    /// Outbound bytes queued but not yet accepted by the transport.
    pub fn buffered_amount(&self) -> usize {
        self.lock().outbound.len()
    }

    /// Snapshot of the traffic counters.
    pub fn stats(&self) -> Statistics {
        self.stats.snapshot()
    }

    /// Associate embedder data with this connection.
    ///
    /// Only a weak reference is stored; the embedder keeps ownership.
    pub fn set_user_data(&self, data: &Arc<U>) {
        *self.user_data.lock().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(data);
    }

    /// The associated embedder data, if set and still alive.
    pub fn user_data(&self) -> Option<Arc<U>> {
        self.user_data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Forget the associated embedder data.
    pub fn clear_user_data(&self) {
        *self.user_data.lock().unwrap_or_else(PoisonError::into_inner) = Weak::new();
    }

    /// Release the transport.
    pub fn into_transport(self) -> T {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .transport
    }

    /// Deliver queued events to `handler`.
    ///
    /// Events raised on other threads, such as a send that failed on the
    /// transport, wait here until the driving thread dispatches them.
    /// [`feed`](Self::feed) and [`pump`](Self::pump) dispatch on their own.
    pub fn dispatch<H: Handler<T, U>>(&self, handler: &mut H) {
        loop {
            let events = mem::take(&mut self.lock().events);
            if events.is_empty() {
                return;
            }
            for event in events {
                match event {
                    Event::Open => handler.on_open(self),
                    Event::Message(message) => handler.on_message(self, message),
                    Event::Close(code, reason) => handler.on_close(self, code, &reason),
                    Event::Error(error) => handler.on_error(self, &error),
                }
            }
        }
    }
}

impl<T: Write, U> Connection<T, U> {
    /// Create a server connection awaiting the client's upgrade request.
    ///
    /// The role in `config` is overridden.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `config` does not validate.
    pub fn server(transport: T, config: Config) -> Result<Self> {
        let config = config.with_role(Role::Server);
        config.validate()?;
        Ok(Self::from_inner(Inner::new(
            transport,
            config,
            Handshake::AwaitRequest,
        )))
    }

    /// Create a client connection and send the upgrade request for `path` on `host`.
    ///
    /// The role in `config` is overridden; `config.protocols` are offered.
    /// If the transport would block, the rest of the request stays queued
    /// for the next [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameter` if `config` does not validate or `host`
    ///   or `path` cannot be put in a request
    /// - `Error::Io` if the transport fails
    pub fn client(transport: T, config: Config, host: &str, path: &str) -> Result<Self> {
        let config = config.with_role(Role::Client);
        config.validate()?;

        let request = HandshakeRequest::client(host, path, &config.protocols)?;
        let mut head = Vec::new();
        request.write(&mut head)?;

        let mut inner = Inner::new(transport, config, Handshake::AwaitResponse(request));
        inner.outbound.extend_from_slice(&head);
        let _ = inner.flush_outbound()?;
        debug!(role = %Role::Client, host, path, "upgrade request sent");

        Ok(Self::from_inner(inner))
    }

    /// Wrap a transport whose HTTP upgrade was completed elsewhere.
    ///
    /// The connection starts OPEN in the role given by `config`; `on_open`
    /// is delivered by the first dispatch.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `config` does not validate.
    pub fn established(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        let mut inner = Inner::new(transport, config, Handshake::Done);
        inner.transition(ConnectionState::Open);
        inner.events.push(Event::Open);
        Ok(Self::from_inner(inner))
    }

    /// Process bytes received from the peer and deliver the resulting events.
    ///
    /// Input may be split at any byte boundary. Protocol faults do not make
    /// this return an error: they fail the connection and are reported
    /// through [`Handler::on_error`] and [`Handler::on_close`]. Bytes fed
    /// after the connection is CLOSED are discarded.
    ///
    /// # Errors
    ///
    /// Returns `Error::Allocation` if a buffer cannot be reserved. When that
    /// happens while decoding a frame the connection is left as it was and
    /// the bytes stay buffered. When a fragmented message cannot grow, the
    /// connection is failed with [`CloseCode::InternalError`] first.
    pub fn feed<H: Handler<T, U>>(&self, data: &[u8], handler: &mut H) -> Result<()> {
        let result = self.lock().receive(data);
        self.dispatch(handler);
        result
    }

    /// Read once from `reader` and feed what arrived.
    ///
    /// End of stream closes the connection with [`CloseCode::Abnormal`]; a
    /// read error fails it. Both are reported through `handler` and yield
    /// [`Pump::Closed`].
    ///
    /// # Errors
    ///
    /// See [`feed`](Self::feed).
    pub fn pump<R: Read, H: Handler<T, U>>(&self, reader: &mut R, handler: &mut H) -> Result<Pump> {
        if !self.state().is_active() {
            return Ok(Pump::Closed);
        }

        let mut buf = [0u8; READ_CHUNK];
        match transport::read_once(reader, &mut buf) {
            Ok(ReadStep::Data(n)) => {
                self.feed(&buf[..n], handler)?;
                Ok(Pump::Read(n))
            }
            Ok(ReadStep::WouldBlock) => Ok(Pump::WouldBlock),
            Ok(ReadStep::Eof) => {
                self.lock().end_of_stream();
                self.dispatch(handler);
                Ok(Pump::Closed)
            }
            Err(e) => {
                self.abort(e.into(), handler);
                Ok(Pump::Closed)
            }
        }
    }

    /// Drive the connection from a blocking reader until it is CLOSED.
    ///
    /// A reader with a read timeout lets the handshake and close timeouts
    /// of the configuration be enforced between reads.
    ///
    /// # Errors
    ///
    /// See [`feed`](Self::feed).
    pub fn run<R: Read, H: Handler<T, U>>(&self, reader: &mut R, handler: &mut H) -> Result<()> {
        loop {
            match self.pump(reader, handler)? {
                Pump::Read(_) => {}
                Pump::WouldBlock => {
                    let now = Instant::now();
                    self.check_handshake_timeout(now, handler);
                    self.check_close_timeout(now, handler);
                }
                Pump::Closed => return Ok(()),
            }
        }
    }

    /// Send a data message.
    ///
    /// With auto-fragmentation enabled, payloads above the threshold go out
    /// as several frames. All frames of a message are queued together, so
    /// concurrent senders never interleave inside a message.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` if the connection is not OPEN
    /// - `Error::PayloadTooLarge` if the payload exceeds the configured
    ///   maximum; the connection stays OPEN
    /// - `Error::Io` if the transport fails; the connection is failed too
    pub fn send(&self, message: Message) -> Result<Flush> {
        let mut inner = self.lock();
        inner.ensure_open()?;
        inner
            .config
            .limits
            .check_payload_size(message.len() as u64)?;

        let opcode = OpCode::from(message.message_type());
        let policy = inner.config.auto_fragment;
        let queued = MessageFragmenter::with_policy(message.as_bytes(), opcode, policy)
            .try_for_each(|frame| inner.queue_frame(&frame));
        if let Err(e) = queued {
            inner.fail(e.clone());
            return Err(e);
        }

        inner.flush_or_fail()
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn send_text(&self, text: impl Into<String>) -> Result<Flush> {
        self.send(Message::text(text))
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<Flush> {
        self.send(Message::binary(data))
    }

    /// Send a ping and start timing the round trip to the next pong.
    ///
    /// # Errors
    ///
    /// `Error::InvalidParameter` for a payload over 125 bytes, otherwise as
    /// [`send`](Self::send).
    pub fn ping(&self, payload: impl Into<Vec<u8>>) -> Result<Flush> {
        let payload = payload.into();
        control::check_outgoing_control(&payload)?;

        let mut inner = self.lock();
        inner.ensure_open()?;
        inner.queue_frame(&Frame::ping(payload))?;
        inner.ping_sent_at = Some(Instant::now());
        inner.stats.record_ping_sent();
        inner.flush_or_fail()
    }

    /// Send an unsolicited pong.
    ///
    /// # Errors
    ///
    /// As [`ping`](Self::ping).
    pub fn pong(&self, payload: impl Into<Vec<u8>>) -> Result<Flush> {
        let payload = payload.into();
        control::check_outgoing_control(&payload)?;

        let mut inner = self.lock();
        inner.ensure_open()?;
        inner.queue_frame(&Frame::pong(payload))?;
        inner.stats.record_pong_sent();
        inner.flush_or_fail()
    }

    /// Start the closing handshake.
    ///
    /// The connection moves to CLOSING; it reaches CLOSED when the peer's
    /// close arrives, the transport ends, or
    /// [`check_close_timeout`](Self::check_close_timeout) gives up. Calling
    /// this when the connection is not OPEN does nothing.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameter` for a code that may not be sent, or a
    ///   reason over 123 bytes
    /// - `Error::Io` if the transport fails
    pub fn close(&self, code: CloseCode, reason: &str) -> Result<Flush> {
        control::check_outgoing_close(code, reason)?;

        let mut inner = self.lock();
        if inner.state != ConnectionState::Open {
            return Ok(inner.pending_flush());
        }

        inner.queue_frame(&Frame::close(Some(code.as_u16()), reason))?;
        inner.close_sent = true;
        inner.closing_since = Some(Instant::now());
        inner.transition(ConnectionState::Closing);
        debug!(role = %self.role, code = code.as_u16(), "close frame sent");
        inner.flush_or_fail()
    }

    /// Write queued outbound bytes to the transport.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the transport fails; the connection is failed too.
    pub fn flush(&self) -> Result<Flush> {
        self.lock().flush_or_fail()
    }

    /// Fail the connection because of a fault the engine cannot see, such as
    /// a TLS error in the embedder's transport.
    ///
    /// Fires `on_error`, then `on_close` with [`CloseCode::Abnormal`]. Does
    /// nothing once CLOSED.
    pub fn abort<H: Handler<T, U>>(&self, error: Error, handler: &mut H) {
        self.lock().fail(error);
        self.dispatch(handler);
    }

    /// Give up on a closing handshake that has lasted longer than the close
    /// timeout, closing with [`CloseCode::Abnormal`].
    ///
    /// Returns `true` if the connection was closed by this call.
    pub fn check_close_timeout<H: Handler<T, U>>(&self, now: Instant, handler: &mut H) -> bool {
        let expired = {
            let mut inner = self.lock();
            let limit = inner.config.timeouts.close;
            let expired = inner.state == ConnectionState::Closing
                && inner
                    .closing_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= limit);
            if expired {
                debug!(role = %self.role, "closing handshake timed out");
                inner.transition(ConnectionState::Closed);
                inner.notify_close(CloseCode::Abnormal, "Close handshake timed out".into());
            }
            expired
        };
        self.dispatch(handler);
        expired
    }

    /// Fail a connection still CONNECTING after the handshake timeout.
    ///
    /// Returns `true` if the connection was failed by this call.
    pub fn check_handshake_timeout<H: Handler<T, U>>(
        &self,
        now: Instant,
        handler: &mut H,
    ) -> bool {
        let expired = {
            let mut inner = self.lock();
            let limit = inner.config.timeouts.handshake;
            let expired = inner.state == ConnectionState::Connecting
                && now.saturating_duration_since(inner.started_at) >= limit;
            if expired {
                inner.fail(Error::InvalidHandshake("opening handshake timed out".into()));
            }
            expired
        };
        self.dispatch(handler);
        expired
    }
}

impl<T: Write> Inner<T> {
    fn new(transport: T, config: Config, handshake: Handshake) -> Self {
        Self {
            transport,
            codec: FrameCodec::new(config.role, config.limits.clone()),
            assembler: MessageAssembler::new(&config),
            config,
            state: ConnectionState::Connecting,
            handshake,
            read_buf: BytesMut::new(),
            outbound: BytesMut::new(),
            protocol: None,
            started_at: Instant::now(),
            closing_since: None,
            ping_sent_at: None,
            close_sent: false,
            close_notified: false,
            events: Vec::new(),
            stats: Arc::new(StatsTracker::new()),
        }
    }

    fn role(&self) -> Role {
        self.codec.role()
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        debug!(role = %self.role(), from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.can_send() {
            Ok(())
        } else {
            Err(Error::InvalidState(self.state))
        }
    }

    fn pending_flush(&self) -> Flush {
        if self.outbound.is_empty() {
            Flush::Complete
        } else {
            Flush::Pending
        }
    }

    fn queue_frame(&mut self, frame: &Frame) -> Result<()> {
        let written = self.codec.encode(frame, &mut self.outbound)?;
        self.stats.record_sent(1, written);
        Ok(())
    }

    fn flush_outbound(&mut self) -> Result<Flush> {
        transport::write_queued(&mut self.transport, &mut self.outbound)
    }

    fn flush_or_fail(&mut self) -> Result<Flush> {
        self.flush_outbound().inspect_err(|e| self.fail(e.clone()))
    }

    fn notify_close(&mut self, code: CloseCode, reason: String) {
        if !self.close_notified {
            self.close_notified = true;
            self.events.push(Event::Close(code, reason));
        }
    }

    /// Tear the connection down after a fault.
    fn fail(&mut self, error: Error) {
        if self.state == ConnectionState::Closed {
            debug!(role = %self.role(), error = %error, "fault after close ignored");
            return;
        }
        warn!(role = %self.role(), state = %self.state, error = %error, "connection failed");

        let code = error.close_code();
        // No close frame is ever exchanged before OPEN.
        let reported = if self.state == ConnectionState::Connecting {
            CloseCode::Abnormal
        } else {
            code
        };
        if self.state == ConnectionState::Connecting {
            if self.role() == Role::Server && matches!(self.handshake, Handshake::AwaitRequest) {
                self.reject(None);
            }
        } else if self.state == ConnectionState::Open && code != CloseCode::Abnormal {
            let frame = Frame::close(Some(code.as_u16()), "");
            match self.queue_frame(&frame) {
                Ok(()) => self.close_sent = true,
                Err(e) => debug!(error = %e, "close frame not sent"),
            }
        }
        if code == CloseCode::Abnormal {
            self.outbound.clear();
        }

        self.transition(ConnectionState::Closed);
        self.assembler.reset();
        let reason = error.to_string();
        self.events.push(Event::Error(error));
        self.notify_close(reported, reason);
    }

    fn reject(&mut self, request: Option<&HandshakeRequest>) {
        let mut reply = Vec::new();
        Rejection::for_request(request).write(&mut reply);
        self.outbound.extend_from_slice(&reply);
        self.handshake = Handshake::Done;
    }

    fn receive(&mut self, data: &[u8]) -> Result<()> {
        if !self.state.is_active() {
            trace!(role = %self.role(), len = data.len(), "bytes after close discarded");
            return Ok(());
        }
        self.read_buf.extend_from_slice(data);

        let outcome = match self.process() {
            Ok(()) => Ok(()),
            Err(e @ Error::Allocation(_)) => Err(e),
            Err(e) => {
                self.fail(e);
                Ok(())
            }
        };

        if let Err(e) = self.flush_outbound() {
            self.fail(e);
        }
        outcome
    }

    fn process(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connecting && !self.advance_handshake()? {
            return Ok(());
        }

        while self.state.can_receive() {
            let before = self.read_buf.len();
            let Some(frame) = self.codec.decode(&mut self.read_buf)? else {
                break;
            };
            self.stats.record_received(before - self.read_buf.len());
            self.on_frame(frame)?;
        }

        if self.state == ConnectionState::Closed {
            self.read_buf.clear();
        }
        Ok(())
    }

    /// Returns `true` once the handshake has completed.
    fn advance_handshake(&mut self) -> Result<bool> {
        let limits = &self.config.limits;
        let Some(end) = find_header_end(&self.read_buf) else {
            limits.check_handshake_size(self.read_buf.len())?;
            return Ok(false);
        };
        limits.check_handshake_size(end)?;

        let head = self.read_buf.split_to(end);
        match mem::replace(&mut self.handshake, Handshake::Done) {
            Handshake::AwaitRequest => self.accept_request(&head)?,
            Handshake::AwaitResponse(request) => self.verify_response(&head, &request)?,
            Handshake::Done => {}
        }

        self.transition(ConnectionState::Open);
        self.events.push(Event::Open);
        debug!(
            role = %self.role(),
            protocol = self.protocol.as_deref().unwrap_or(""),
            "handshake complete"
        );
        Ok(true)
    }

    fn accept_request(&mut self, head: &[u8]) -> Result<()> {
        let request = HandshakeRequest::parse(head).inspect_err(|_| self.reject(None))?;
        if let Err(e) = request.validate() {
            self.reject(Some(&request));
            return Err(e);
        }

        let response = HandshakeResponse::from_request(&request, &self.config.protocols);
        let mut reply = Vec::new();
        response.write(&mut reply)?;
        self.outbound.extend_from_slice(&reply);
        self.protocol = response.protocol;
        Ok(())
    }

    fn verify_response(&mut self, head: &[u8], request: &HandshakeRequest) -> Result<()> {
        let response = HandshakeResponse::parse(head)?;
        response.verify(request)?;
        self.protocol = response.protocol;
        Ok(())
    }

    fn on_frame(&mut self, frame: Frame) -> Result<()> {
        if !frame.opcode.is_control() {
            let pushed = self.assembler.push(frame);
            return self.deliver(pushed);
        }

        match Control::from_frame(frame, self.config.validate_utf8)? {
            Control::Ping(payload) => {
                self.stats.record_ping_received();
                if self.state == ConnectionState::Open {
                    self.queue_frame(&Frame::pong(payload))?;
                    self.stats.record_pong_sent();
                }
            }
            Control::Pong(_) => {
                let rtt = self.ping_sent_at.take().map(|sent| sent.elapsed());
                self.stats.record_pong_received(rtt);
            }
            Control::Close(close) => {
                let (code, reason) = match close {
                    Some(frame) => (frame.code, frame.reason),
                    None => (CloseCode::NoStatusReceived, String::new()),
                };
                debug!(role = %self.role(), code = code.as_u16(), "close frame received");

                if !self.close_sent {
                    let echo = match code {
                        CloseCode::NoStatusReceived => Frame::close(None, ""),
                        code => Frame::close(Some(code.as_u16()), ""),
                    };
                    self.queue_frame(&echo)?;
                    self.close_sent = true;
                    self.transition(ConnectionState::Closing);
                }
                self.transition(ConnectionState::Closed);
                self.notify_close(code, reason);
            }
        }
        Ok(())
    }

    /// Queue a reassembled message. Running out of memory mid-message fails
    /// the connection, since the partial message is already gone.
    fn deliver(&mut self, pushed: Result<Option<Message>>) -> Result<()> {
        match pushed {
            Ok(Some(message)) => self.events.push(Event::Message(message)),
            Ok(None) => {}
            Err(e @ Error::Allocation(_)) => {
                self.fail(e.clone());
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn end_of_stream(&mut self) {
        match self.state {
            ConnectionState::Closed => {}
            ConnectionState::Connecting => {
                self.fail(Error::Io("connection closed during handshake".into()));
            }
            _ => {
                debug!(role = %self.role(), "transport reached end of stream");
                self.transition(ConnectionState::Closed);
                self.assembler.reset();
                self.notify_close(CloseCode::Abnormal, "Connection closed by peer".into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Limits;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl<T, U> Handler<T, U> for Log {
        fn on_open(&mut self, _: &Connection<T, U>) {
            self.0.push("open".into());
        }
        fn on_message(&mut self, _: &Connection<T, U>, message: Message) {
            match message {
                Message::Text(text) => self.0.push(format!("text:{text}")),
                Message::Binary(data) => self.0.push(format!("binary:{}", data.len())),
            }
        }
        fn on_close(&mut self, _: &Connection<T, U>, code: CloseCode, reason: &str) {
            self.0.push(format!("close:{}:{reason}", code.as_u16()));
        }
        fn on_error(&mut self, _: &Connection<T, U>, error: &Error) {
            self.0.push(format!("error:{:?}", error.kind()));
        }
    }

    fn take_output(conn: &Connection<Vec<u8>>) -> Vec<u8> {
        mem::take(&mut conn.lock().transport)
    }

    fn open_server(config: Config) -> Connection<Vec<u8>> {
        Connection::established(Vec::new(), config.with_role(Role::Server)).unwrap()
    }

    /// Frames as a client would put them on the wire.
    fn client_bytes(frames: &[Frame]) -> Vec<u8> {
        let codec = FrameCodec::new(Role::Client, Limits::default());
        let mut buf = BytesMut::new();
        for frame in frames {
            codec.encode(frame, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    /// Decode what a server wrote.
    fn server_frames(bytes: &[u8]) -> Vec<Frame> {
        let codec = FrameCodec::new(Role::Client, Limits::default());
        let mut buf = BytesMut::from(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        assert!(buf.is_empty());
        frames
    }

    #[test]
    fn test_handshake_between_client_and_server() {
        let mut client_log = Log::default();
        let mut server_log = Log::default();
        let client: Connection<Vec<u8>> =
            Connection::client(Vec::new(), Config::client(), "example.com", "/chat").unwrap();
        let server: Connection<Vec<u8>> = Connection::server(Vec::new(), Config::server()).unwrap();
        assert_eq!(client.state(), ConnectionState::Connecting);

        server.feed(&take_output(&client), &mut server_log).unwrap();
        assert_eq!(server.state(), ConnectionState::Open);

        client.feed(&take_output(&server), &mut client_log).unwrap();
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(client_log.0, ["open"]);
        assert_eq!(server_log.0, ["open"]);
    }

    #[test]
    fn test_handshake_split_at_every_byte() {
        let client: Connection<Vec<u8>> =
            Connection::client(Vec::new(), Config::client(), "h", "/").unwrap();
        let server: Connection<Vec<u8>> = Connection::server(Vec::new(), Config::server()).unwrap();
        let mut log = Log::default();
        for byte in take_output(&client) {
            server.feed(&[byte], &mut log).unwrap();
        }
        assert!(server.is_open());
        assert_eq!(log.0, ["open"]);
    }

    #[test]
    fn test_frames_after_handshake_in_same_chunk() {
        let client: Connection<Vec<u8>> =
            Connection::client(Vec::new(), Config::client(), "h", "/").unwrap();
        let server: Connection<Vec<u8>> = Connection::server(Vec::new(), Config::server()).unwrap();

        let mut chunk = take_output(&client);
        chunk.extend(client_bytes(&[Frame::text("early")]));
        let mut log = Log::default();
        server.feed(&chunk, &mut log).unwrap();
        assert_eq!(log.0, ["open", "text:early"]);
    }

    #[test]
    fn test_bad_request_gets_400() {
        let server: Connection<Vec<u8>> = Connection::server(Vec::new(), Config::server()).unwrap();
        let mut log = Log::default();
        server
            .feed(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n", &mut log)
            .unwrap();
        assert_eq!(server.state(), ConnectionState::Closed);
        assert!(take_output(&server).starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
        assert_eq!(log.0.len(), 2);
        assert_eq!(log.0[0], "error:ProtocolViolation");
        assert!(log.0[1].starts_with("close:1006:"));
    }

    #[test]
    fn test_non_101_response_closes_abnormally() {
        let client: Connection<Vec<u8>> =
            Connection::client(Vec::new(), Config::client(), "h", "/").unwrap();
        let mut log = Log::default();
        client
            .feed(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n", &mut log)
            .unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(log.0.len(), 2);
        assert_eq!(log.0[0], "error:ConnectFailed");
        assert!(log.0[1].starts_with("close:1006:"));

        client.feed(b"HTTP/1.1 101 Switching Protocols\r\n\r\n", &mut log).unwrap();
        assert_eq!(log.0.len(), 2);
    }

    #[test]
    fn test_reassembly_out_of_memory_fails_with_1011() {
        let server = open_server(Config::server());
        let mut log = Log::default();
        server.dispatch(&mut log);
        take_output(&server);

        let result = server.lock().deliver(Err(Error::Allocation(usize::MAX)));
        assert_eq!(result, Err(Error::Allocation(usize::MAX)));
        server.dispatch(&mut log);

        assert_eq!(server.state(), ConnectionState::Closed);
        assert_eq!(log.0[1], "error:AllocationFailure");
        assert!(log.0[2].starts_with("close:1011:"));
        let sent = server_frames(&server.lock().outbound);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload()[..2], 1011u16.to_be_bytes());
    }

    #[test]
    fn test_oversized_handshake_rejected() {
        let config = Config::server().with_limits(Limits::new(1024, 64));
        let server: Connection<Vec<u8>> = Connection::server(Vec::new(), config).unwrap();
        let mut log = Log::default();
        server.feed(&[b'a'; 100], &mut log).unwrap();
        assert_eq!(server.state(), ConnectionState::Closed);
        assert_eq!(log.0.len(), 2);
        assert_eq!(log.0[0], "error:ProtocolViolation");
    }

    #[test]
    fn test_established_delivers_open_on_dispatch() {
        let conn = open_server(Config::server());
        let mut log = Log::default();
        conn.dispatch(&mut log);
        assert_eq!(log.0, ["open"]);
        conn.dispatch(&mut log);
        assert_eq!(log.0.len(), 1);
    }

    #[test]
    fn test_ping_answered_with_identical_pong() {
        let conn = open_server(Config::server());
        conn.feed(&client_bytes(&[Frame::ping(b"abc".to_vec())]), &mut ())
            .unwrap();

        let frames = server_frames(&take_output(&conn));
        assert_eq!(frames, [Frame::pong(b"abc".to_vec())]);
        let stats = conn.stats();
        assert_eq!(stats.pings_received, 1);
        assert_eq!(stats.pongs_sent, 1);
    }

    #[test]
    fn test_unmasked_client_frame_closes_with_1002() {
        let conn = open_server(Config::server());
        let mut log = Log::default();
        conn.dispatch(&mut log);

        let mut unmasked = BytesMut::new();
        Frame::text("hi").write(&mut unmasked, None);
        conn.feed(&unmasked, &mut log).unwrap();

        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(log.0[1], "error:ProtocolViolation");
        assert!(log.0[2].starts_with("close:1002:"));
        let frames = server_frames(&take_output(&conn));
        assert_eq!(frames[0].payload()[..2], 1002u16.to_be_bytes());
    }

    #[test]
    fn test_invalid_utf8_closes_with_1007() {
        let conn = open_server(Config::server());
        let mut log = Log::default();
        conn.feed(&client_bytes(&[Frame::text(vec![0xC0, 0xAF])]), &mut log)
            .unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(log.0.iter().any(|e| e.starts_with("close:1007:")));
        assert!(!log.0.iter().any(|e| e.starts_with("text:")));
    }

    #[test]
    fn test_peer_close_is_echoed() {
        let conn = open_server(Config::server());
        let mut log = Log::default();
        conn.feed(&client_bytes(&[Frame::close(Some(1000), "bye")]), &mut log)
            .unwrap();

        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(log.0, ["open", "close:1000:bye"]);
        let frames = server_frames(&take_output(&conn));
        assert_eq!(frames, [Frame::close(Some(1000), "")]);
    }

    #[test]
    fn test_close_without_status_reports_1005() {
        let conn = open_server(Config::server());
        let mut log = Log::default();
        conn.feed(&client_bytes(&[Frame::close(None, "")]), &mut log)
            .unwrap();
        assert_eq!(log.0.last().unwrap(), "close:1005:");
        assert_eq!(server_frames(&take_output(&conn)), [Frame::close(None, "")]);
    }

    #[test]
    fn test_send_after_close_is_invalid_state() {
        let conn = open_server(Config::server());
        conn.close(CloseCode::Normal, "done").unwrap();
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(
            conn.send_text("late"),
            Err(Error::InvalidState(ConnectionState::Closing))
        );
    }

    #[test]
    fn test_close_rejects_reserved_code() {
        let conn = open_server(Config::server());
        assert!(matches!(
            conn.close(CloseCode::Abnormal, ""),
            Err(Error::InvalidParameter(_))
        ));
        assert!(conn.is_open());
    }

    #[test]
    fn test_oversized_send_keeps_connection_open() {
        let conn = open_server(Config::server().with_max_payload_size(8));
        assert!(matches!(
            conn.send_binary(vec![0u8; 9]),
            Err(Error::PayloadTooLarge { size: 9, max: 8 })
        ));
        assert!(conn.is_open());
        assert!(take_output(&conn).is_empty());
    }

    #[test]
    fn test_auto_fragmentation_on_send() {
        let conn = open_server(Config::server().with_auto_fragment(4));
        assert_eq!(conn.send_text("HelloWorld").unwrap(), Flush::Complete);

        let frames = server_frames(&take_output(&conn));
        let parts: Vec<_> = frames
            .iter()
            .map(|f| (f.payload().to_vec(), f.opcode, f.fin))
            .collect();
        assert_eq!(
            parts,
            [
                (b"Hell".to_vec(), OpCode::Text, false),
                (b"oWor".to_vec(), OpCode::Continuation, false),
                (b"ld".to_vec(), OpCode::Continuation, true),
            ]
        );
        assert_eq!(conn.stats().frames_sent, 3);
    }

    #[test]
    fn test_eof_reports_1006() {
        let conn = open_server(Config::server());
        let mut log = Log::default();
        let mut empty: &[u8] = &[];
        assert_eq!(conn.pump(&mut empty, &mut log).unwrap(), Pump::Closed);
        assert_eq!(log.0, ["open", "close:1006:Connection closed by peer"]);
    }

    #[test]
    fn test_close_timeout() {
        let conn = open_server(Config::server());
        conn.close(CloseCode::Normal, "").unwrap();
        let mut log = Log::default();
        assert!(!conn.check_close_timeout(Instant::now(), &mut log));

        let later = Instant::now() + conn.lock().config.timeouts.close;
        assert!(conn.check_close_timeout(later, &mut log));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(log.0.last().unwrap(), "close:1006:Close handshake timed out");
    }

    #[test]
    fn test_abort_fires_error_then_close_once() {
        let conn = open_server(Config::server());
        let mut log = Log::default();
        conn.abort(Error::Tls("bad record".into()), &mut log);
        conn.abort(Error::Tls("again".into()), &mut log);
        assert_eq!(log.0, ["open", "error:TlsFailure", "close:1006:TLS failure: bad record"]);
    }

    #[test]
    fn test_user_data_is_weak() {
        let conn: Connection<Vec<u8>, String> =
            Connection::established(Vec::new(), Config::server()).unwrap();
        let data = Arc::new("session".to_string());
        conn.set_user_data(&data);
        assert_eq!(conn.user_data().as_deref(), Some(&"session".to_string()));
        drop(data);
        assert!(conn.user_data().is_none());
    }
}
