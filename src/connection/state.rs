//! WebSocket connection state machine as defined in RFC 6455.

/// WebSocket connection state.
///
/// ```text
/// CONNECTING --handshake ok--> OPEN --close sent/received--> CLOSING --> CLOSED
///      |                        |                                          ^
///      +----- handshake failed -+------ protocol or transport fault -------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Opening handshake in progress.
    #[default]
    Connecting,
    /// Handshake complete; data may flow both ways.
    Open,
    /// A close frame has been sent or received; waiting for the handshake to finish.
    Closing,
    /// Terminal. Nothing is sent or delivered any more.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for every state except `Closed`.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Check if the embedder may send data in this state.
    ///
    /// Returns `true` only for `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if inbound frames are processed in this state.
    ///
    /// Returns `true` for `Open` or `Closing`.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Any active state may fail straight to `Closed`; `Closed` goes nowhere.
    #[must_use]
    pub const fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Connecting, ConnectionState::Open)
                | (ConnectionState::Open, ConnectionState::Closing)
                | (
                    ConnectionState::Connecting
                        | ConnectionState::Open
                        | ConnectionState::Closing,
                    ConnectionState::Closed
                )
        )
    }

    /// Uppercase name, as used in log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
