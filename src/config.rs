//! Configuration and limits for WebSocket connections.

use std::time::Duration;

use crate::connection::Role;
use crate::error::{Error, Result};

/// Resource limits for a connection.
///
/// These limits bound memory use under adversarial input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size in bytes, for a single frame and for a
    /// reassembled message alike.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_payload_size: usize,

    /// Maximum size of the handshake header block in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_size: 16 * 1024 * 1024, // 16 MB
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_payload_size: usize, max_handshake_size: usize) -> Self {
        Self {
            max_payload_size,
            max_handshake_size,
        }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max payload: 64 KB
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_payload_size: 64 * 1024,
            max_handshake_size: 4096,
        }
    }

    /// Validate that a payload size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_payload_size(&self, size: u64) -> Result<()> {
        if size > self.max_payload_size as u64 {
            Err(Error::PayloadTooLarge {
                size,
                max: self.max_payload_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a reassembled message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<()> {
        if size > self.max_payload_size {
            Err(Error::MessageTooLarge {
                size,
                max: self.max_payload_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<()> {
        if size > self.max_handshake_size {
            Err(Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Outbound auto-fragmentation settings.
///
/// When enabled, data messages larger than `threshold` are split into frames
/// carrying at most `threshold` payload bytes each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoFragment {
    /// Whether outbound messages are split.
    pub enabled: bool,
    /// Largest payload carried by a single outbound frame.
    ///
    /// Default: 16 KB (16 * 1024)
    pub threshold: usize,
}

impl Default for AutoFragment {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 16 * 1024,
        }
    }
}

impl AutoFragment {
    /// Enabled auto-fragmentation with the given threshold.
    #[must_use]
    pub const fn enabled(threshold: usize) -> Self {
        Self {
            enabled: true,
            threshold,
        }
    }

    /// Fragment size to use for an outbound payload, if any.
    #[inline]
    #[must_use]
    pub const fn fragment_size(&self) -> Option<usize> {
        if self.enabled {
            Some(self.threshold)
        } else {
            None
        }
    }
}

/// Timeout configuration for WebSocket connections.
///
/// Enforcement is the caller's responsibility; the engine owns no timers.
/// See [`Connection::check_close_timeout`](crate::Connection::check_close_timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time to complete the opening handshake.
    ///
    /// Default: 30 seconds
    pub handshake: Duration,

    /// Grace period for the peer's close frame after ours was sent.
    ///
    /// Default: 5 seconds
    pub close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(30),
            close: Duration::from_secs(5),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(handshake: Duration, close: Duration) -> Self {
        Self { handshake, close }
    }
}

/// WebSocket connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection role. Decides masking direction and handshake side.
    ///
    /// Default: `Role::Server`
    pub role: Role,

    /// Resource limits.
    pub limits: Limits,

    /// Outbound auto-fragmentation.
    ///
    /// Default: disabled
    pub auto_fragment: AutoFragment,

    /// Validate UTF-8 in text messages and close reasons.
    ///
    /// Default: true
    pub validate_utf8: bool,

    /// Subprotocols offered (client) or supported (server), in preference order.
    ///
    /// Default: empty
    pub protocols: Vec<String>,

    /// Timeout configuration.
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::Server,
            limits: Limits::default(),
            auto_fragment: AutoFragment::default(),
            validate_utf8: true,
            protocols: Vec::new(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure for server role.
    #[must_use]
    pub fn server() -> Self {
        Self {
            role: Role::Server,
            ..Default::default()
        }
    }

    /// Configure for client role.
    #[must_use]
    pub fn client() -> Self {
        Self {
            role: Role::Client,
            ..Default::default()
        }
    }

    /// Set the connection role.
    #[must_use]
    pub const fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the maximum payload size.
    #[must_use]
    pub const fn with_max_payload_size(mut self, size: usize) -> Self {
        self.limits.max_payload_size = size;
        self
    }

    /// Enable auto-fragmentation of outbound messages above `threshold` bytes.
    #[must_use]
    pub const fn with_auto_fragment(mut self, threshold: usize) -> Self {
        self.auto_fragment = AutoFragment::enabled(threshold);
        self
    }

    /// Enable or disable UTF-8 validation.
    #[must_use]
    pub const fn with_utf8_validation(mut self, enabled: bool) -> Self {
        self.validate_utf8 = enabled;
        self
    }

    /// Set offered/supported subprotocols.
    #[must_use]
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Set timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Check the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero payload or handshake
    /// limit, a zero fragmentation threshold, or a subprotocol name that is
    /// empty or contains separators.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_payload_size == 0 {
            return Err(Error::InvalidParameter(
                "max_payload_size must be non-zero".into(),
            ));
        }
        if self.limits.max_handshake_size == 0 {
            return Err(Error::InvalidParameter(
                "max_handshake_size must be non-zero".into(),
            ));
        }
        if self.auto_fragment.enabled && self.auto_fragment.threshold == 0 {
            return Err(Error::InvalidParameter(
                "auto_fragment threshold must be non-zero".into(),
            ));
        }
        for proto in &self.protocols {
            let valid = !proto.is_empty()
                && proto
                    .bytes()
                    .all(|b| b.is_ascii_graphic() && !b",;\"".contains(&b));
            if !valid {
                return Err(Error::InvalidParameter(format!(
                    "invalid subprotocol name: {proto:?}"
                )));
            }
        }
        Ok(())
    }
}
