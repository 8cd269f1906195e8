//! WebSocket opening handshake (RFC 6455 Section 4).
//!
//! Both sides of the HTTP/1.1 Upgrade exchange: building and verifying the
//! client request, and parsing and answering it on the server. The types here
//! work on complete header blocks; [`find_header_end`] locates one in a
//! partially filled receive buffer.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this engine speaks.
pub const WS_VERSION: u8 = 13;

/// Headers that must appear at most once in a request.
const SINGLETON_REQUEST_HEADERS: [&str; 5] = [
    "host",
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
];

/// Headers that must appear at most once in a response.
const SINGLETON_RESPONSE_HEADERS: [&str; 3] = ["upgrade", "connection", "sec-websocket-accept"];

/// Find the end of an HTTP header block.
///
/// Returns the length of the block including the terminating `\r\n\r\n`, or
/// `None` if the terminator has not arrived yet.
#[must_use]
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsengine::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh Sec-WebSocket-Key: 16 random bytes, base64 encoded.
///
/// # Errors
///
/// Returns `Error::Io` if the random source is unavailable.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| Error::Io(format!("random source unavailable: {e}")))?;
    Ok(BASE64.encode(nonce))
}

/// Parse header lines into a map keyed by lowercase name.
///
/// Repeated headers are joined with `", "`, except those listed in
/// `singletons`, whose repetition is rejected.
fn parse_headers<'a, I>(lines: I, singletons: &[&str]) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            return Err(Error::InvalidHandshake(
                "Folded header lines are not supported".into(),
            ));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHandshake(format!("Malformed header line: {line}")))?;
        if name.is_empty() || name.contains([' ', '\t']) {
            return Err(Error::InvalidHandshake(format!(
                "Malformed header name: {name:?}"
            )));
        }

        let name_lower = name.to_ascii_lowercase();
        let value = value.trim();
        match headers.get_mut(&name_lower) {
            Some(_) if singletons.contains(&name_lower.as_str()) => {
                return Err(Error::InvalidHandshake(format!("Duplicate header: {name}")));
            }
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                headers.insert(name_lower, value.to_string());
            }
        }
    }

    Ok(headers)
}

/// Validate that a header value does not contain CR or LF characters.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidParameter(format!(
            "{header_name} value contains CR or LF characters"
        )));
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn has_token(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|part| part.trim().eq_ignore_ascii_case(token))
}

fn header_text(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data).map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))
}

/// Check the Upgrade and Connection headers shared by requests and responses.
fn check_upgrade_headers(headers: &HashMap<String, String>) -> Result<()> {
    let upgrade = headers
        .get("upgrade")
        .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header".into()))?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Upgrade header: {upgrade}"
        )));
    }

    let connection = headers
        .get("connection")
        .ok_or_else(|| Error::InvalidHandshake("Missing Connection header".into()))?;
    if !has_token(connection, "upgrade") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Connection header: {connection}"
        )));
    }
    Ok(())
}

/// WebSocket handshake request sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request path (e.g., "/chat").
    pub path: String,
    /// The Host header value.
    pub host: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
    /// The Sec-WebSocket-Version.
    pub version: u8,
    /// The Origin header value (optional).
    pub origin: Option<String>,
    /// The Sec-WebSocket-Protocol values, in the client's preference order.
    pub protocols: Vec<String>,
}

impl HandshakeRequest {
    /// Build a client request with a freshly generated key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if no key can be generated.
    pub fn client(host: &str, path: &str, protocols: &[String]) -> Result<Self> {
        Ok(Self {
            path: path.to_string(),
            host: host.to_string(),
            key: generate_key()?,
            version: WS_VERSION,
            origin: None,
            protocols: protocols.to_vec(),
        })
    }

    /// Parse a WebSocket handshake request from a complete header block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The request line is malformed, the method is not `GET`, or the
    ///   version is not `HTTP/1.1`.
    /// - A header line is folded or malformed, or a singleton header repeats.
    /// - `Upgrade`, `Connection`, `Host`, `Sec-WebSocket-Key` or
    ///   `Sec-WebSocket-Version` is missing or unusable.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut lines = header_text(data)?.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty request".into()))?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let [method, target, http] = parts.as_slice() else {
            return Err(Error::InvalidHandshake("Invalid request line".into()));
        };
        if *method != "GET" {
            return Err(Error::InvalidHandshake(format!(
                "Expected GET method, got {method}"
            )));
        }
        if *http != "HTTP/1.1" {
            return Err(Error::InvalidHandshake(format!(
                "Expected HTTP/1.1, got {http}"
            )));
        }

        let headers = parse_headers(lines, &SINGLETON_REQUEST_HEADERS)?;
        check_upgrade_headers(&headers)?;

        let host = headers
            .get("host")
            .ok_or_else(|| Error::InvalidHandshake("Missing Host header".into()))?
            .clone();
        let key = headers
            .get("sec-websocket-key")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Key header".into()))?
            .clone();
        let version_str = headers.get("sec-websocket-version").ok_or_else(|| {
            Error::InvalidHandshake("Missing Sec-WebSocket-Version header".into())
        })?;
        let version: u8 = version_str
            .parse()
            .map_err(|_| Error::InvalidHandshake(format!("Invalid version: {version_str}")))?;

        Ok(Self {
            path: (*target).to_string(),
            host,
            key,
            version,
            origin: headers.get("origin").cloned(),
            protocols: headers
                .get("sec-websocket-protocol")
                .map(|p| split_list(p))
                .unwrap_or_default(),
        })
    }

    /// Validate the handshake request according to RFC 6455.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The WebSocket version is not 13.
    /// - The `Sec-WebSocket-Key` is not Base64 of exactly 16 bytes.
    /// - The `Host` header is empty.
    pub fn validate(&self) -> Result<()> {
        if self.version != WS_VERSION {
            return Err(Error::InvalidHandshake(format!(
                "Unsupported WebSocket version: {} (expected 13)",
                self.version
            )));
        }

        match BASE64.decode(&self.key) {
            Ok(decoded) if decoded.len() == 16 => {}
            Ok(decoded) => {
                return Err(Error::InvalidHandshake(format!(
                    "Sec-WebSocket-Key must be 16 bytes, got {}",
                    decoded.len()
                )));
            }
            Err(_) => {
                return Err(Error::InvalidHandshake(
                    "Invalid Sec-WebSocket-Key: not valid Base64".into(),
                ));
            }
        }

        if self.host.is_empty() {
            return Err(Error::InvalidHandshake("Host header cannot be empty".into()));
        }

        Ok(())
    }

    /// Write the HTTP request to a buffer.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if a field would break the header block.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        validate_header_value("Request path", &self.path)?;
        validate_header_value("Host", &self.host)?;
        if self.path.contains(' ') {
            return Err(Error::InvalidParameter("Request path contains spaces".into()));
        }

        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.path).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        buf.extend_from_slice(format!("Sec-WebSocket-Version: {}\r\n", self.version).as_bytes());

        if let Some(ref origin) = self.origin {
            validate_header_value("Origin", origin)?;
            buf.extend_from_slice(format!("Origin: {origin}\r\n").as_bytes());
        }
        if !self.protocols.is_empty() {
            let joined = self.protocols.join(", ");
            validate_header_value("Sec-WebSocket-Protocol", &joined)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {joined}\r\n").as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// WebSocket handshake response from a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The selected Sec-WebSocket-Protocol (optional).
    pub protocol: Option<String>,
    /// Sec-WebSocket-Extensions sent by the server. Always rejected on verify.
    pub extensions: Vec<String>,
}

impl HandshakeResponse {
    /// Create the response to a validated request.
    ///
    /// Selects the first protocol offered by the client that appears in
    /// `supported`. Extensions are never accepted.
    #[must_use]
    pub fn from_request(req: &HandshakeRequest, supported: &[String]) -> Self {
        Self {
            accept: compute_accept_key(&req.key),
            protocol: req
                .protocols
                .iter()
                .find(|offered| supported.contains(offered))
                .cloned(),
            extensions: Vec::new(),
        }
    }

    /// Write the HTTP response to a buffer.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if the protocol contains CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());

        if let Some(ref proto) = self.protocol {
            validate_header_value("Sec-WebSocket-Protocol", proto)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {proto}\r\n").as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Parse a WebSocket handshake response from a complete header block.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectFailed`] if the status code is not 101.
    /// - [`Error::InvalidHandshake`] if the status line or a header is
    ///   malformed, or `Upgrade`, `Connection` or `Sec-WebSocket-Accept` is
    ///   missing or wrong.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut lines = header_text(data)?.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;
        let mut parts = status_line.splitn(3, ' ');
        let http = parts.next().unwrap_or_default();
        let status = parts.next().unwrap_or_default();
        if !http.starts_with("HTTP/1.") || status.len() != 3 {
            return Err(Error::InvalidHandshake(format!(
                "Invalid status line: {status_line}"
            )));
        }
        if status != "101" {
            return Err(Error::ConnectFailed(format!(
                "server answered: {}",
                status_line.trim()
            )));
        }

        let headers = parse_headers(lines, &SINGLETON_RESPONSE_HEADERS)?;
        check_upgrade_headers(&headers)?;

        let accept = headers
            .get("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?
            .clone();

        Ok(Self {
            accept,
            protocol: headers.get("sec-websocket-protocol").cloned(),
            extensions: headers
                .get("sec-websocket-extensions")
                .map(|e| split_list(e))
                .unwrap_or_default(),
        })
    }

    /// Check this response against the request that produced it.
    ///
    /// # Errors
    ///
    /// - [`Error::AcceptKeyMismatch`] if the accept value is wrong.
    /// - [`Error::InvalidHandshake`] if the server selected a protocol the
    ///   client did not offer, or answered with any extension.
    pub fn verify(&self, req: &HandshakeRequest) -> Result<()> {
        let expected = compute_accept_key(&req.key);
        if self.accept != expected {
            return Err(Error::AcceptKeyMismatch {
                expected,
                received: self.accept.clone(),
            });
        }

        if let Some(ref proto) = self.protocol {
            if !req.protocols.contains(proto) {
                return Err(Error::InvalidHandshake(format!(
                    "Server selected unoffered subprotocol: {proto}"
                )));
            }
        }

        if !self.extensions.is_empty() {
            return Err(Error::InvalidHandshake(format!(
                "Server negotiated unsupported extensions: {}",
                self.extensions.join(", ")
            )));
        }

        Ok(())
    }
}

/// HTTP response a server sends when it refuses an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `400 Bad Request`: the request is malformed.
    BadRequest,
    /// `426 Upgrade Required`: the client asked for another protocol version.
    UpgradeRequired,
}

impl Rejection {
    /// Pick the rejection for a request that failed to parse or validate.
    #[must_use]
    pub fn for_request(request: Option<&HandshakeRequest>) -> Self {
        match request {
            Some(req) if req.version != WS_VERSION => Rejection::UpgradeRequired,
            _ => Rejection::BadRequest,
        }
    }

    /// Write the HTTP response to a buffer.
    pub fn write(self, buf: &mut Vec<u8>) {
        match self {
            Rejection::BadRequest => {
                buf.extend_from_slice(b"HTTP/1.1 400 Bad Request\r\n");
            }
            Rejection::UpgradeRequired => {
                buf.extend_from_slice(b"HTTP/1.1 426 Upgrade Required\r\n");
                buf.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");
            }
        }
        buf.extend_from_slice(b"Connection: close\r\nContent-Length: 0\r\n\r\n");
    }
}
