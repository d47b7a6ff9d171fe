use base64ct::{Base64, Encoding};
use heapless::String;

use crate::arena::Buffer;
use crate::ascii::{CR, LF, SP};
use crate::header::RequestHeader;
use crate::response::StatusCode;
use crate::uri;

const GET: &[u8] = "GET".as_bytes();
const POST: &[u8] = "POST".as_bytes();
const PUT: &[u8] = "PUT".as_bytes();
const PATCH: &[u8] = "PATCH".as_bytes();
const DELETE: &[u8] = "DELETE".as_bytes();
const OPTIONS: &[u8] = "OPTIONS".as_bytes();
const HEAD: &[u8] = "HEAD".as_bytes();

/// Capacity of the path field, including an appended index page.
pub const PATH_MAX: usize = 128;
/// Capacity of the query string field.
pub const QUERY_MAX: usize = 128;
/// Capacity of the Host header value.
pub const HOST_MAX: usize = 64;
/// Capacity of the Content-Type header value.
pub const CONTENT_TYPE_MAX: usize = 64;
/// Capacity of the Authorization header value.
pub const AUTH_MAX: usize = 96;
/// Length of a well formed Sec-WebSocket-Key.
pub const WS_KEY_LEN: usize = 24;
/// Capacity of the Sec-WebSocket-Protocol header value.
pub const WS_PROTOCOL_MAX: usize = 64;

#[derive(PartialEq, Debug)]
pub(crate) enum RequestError {
    /// More bytes are needed before the header block is complete.
    Incomplete,
    /// The request cannot be served; answer with the status and stop reading.
    Rejected(StatusCode, &'static str),
}

/// Method such as GET. POST, DELETE etc.
#[non_exhaustive]
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    #[allow(missing_docs)]
    GET,
    #[allow(missing_docs)]
    POST,
    #[allow(missing_docs)]
    PUT,
    #[allow(missing_docs)]
    PATCH,
    #[allow(missing_docs)]
    DELETE,
    #[allow(missing_docs)]
    OPTIONS,
    #[allow(missing_docs)]
    HEAD,
}

impl TryFrom<&[u8]> for Method {
    type Error = &'static str;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        match value {
            GET => Ok(Self::GET),
            POST => Ok(Self::POST),
            PUT => Ok(Self::PUT),
            PATCH => Ok(Self::PATCH),
            DELETE => Ok(Self::DELETE),
            OPTIONS => Ok(Self::OPTIONS),
            HEAD => Ok(Self::HEAD),
            _ => Err("unknown http method"),
        }
    }
}

/// Protocol version from the request line.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Version {
    #[allow(missing_docs)]
    Http10,
    #[allow(missing_docs)]
    Http11,
}

/// Details of a websocket upgrade request.
#[derive(Debug, Default)]
pub struct UpgradeRequest {
    /// `Upgrade: websocket` was present
    pub websocket: bool,
    /// `Connection` listed the `Upgrade` token
    pub connection_upgrade: bool,
    /// Sec-WebSocket-Key, `None` when absent or too long to be valid
    pub key: Option<String<WS_KEY_LEN>>,
    /// Sec-WebSocket-Key was present but overlong
    pub key_malformed: bool,
    /// Sec-WebSocket-Version
    pub version: Option<u8>,
    /// Sec-WebSocket-Protocol as sent, a comma separated list
    pub protocol: Option<String<WS_PROTOCOL_MAX>>,
}

impl UpgradeRequest {
    /// True when any part of a websocket handshake was requested.
    pub fn requested(&self) -> bool {
        self.websocket || self.key.is_some() || self.key_malformed
    }
}

/// Request contains the details parsed from the request line and recognised headers.  Values
/// are copied out of the session buffer so the buffer can be reused while responding.
#[non_exhaustive]
#[derive(Debug)]
pub struct Request {
    /// Method (GET, POST etc) parsed from the request
    pub method: Method,
    /// Protocol version
    pub version: Version,
    /// Normalised URL path without the query, e.g. `/index.html`
    pub path: String<PATH_MAX>,
    /// Query string without the leading `?`
    pub query: String<QUERY_MAX>,
    /// Host extracted from the host header
    pub host: Option<String<HOST_MAX>>,
    /// Content-Type extracted from the Content-Type header where present
    pub content_type: Option<String<CONTENT_TYPE_MAX>>,
    /// Authorization header value where present
    pub authorization: Option<String<AUTH_MAX>>,
    /// Content length extracted from the Content-Length header if present
    pub content_length: Option<usize>,
    /// Connection: close
    pub connection_close: bool,
    /// Connection: keep-alive
    pub connection_keep_alive: bool,
    /// Websocket handshake headers
    pub upgrade: UpgradeRequest,
    /// Bytes of an unterminated header line carried over to the next read
    pub(crate) pending: usize,
    request_line_seen: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub(crate) fn new() -> Self {
        Self {
            method: Method::GET,
            version: Version::Http11,
            path: String::new(),
            query: String::new(),
            host: None,
            content_type: None,
            authorization: None,
            content_length: None,
            connection_close: false,
            connection_keep_alive: false,
            upgrade: UpgradeRequest::default(),
            pending: 0,
            request_line_seen: false,
        }
    }

    /// True when any bytes of a request have been received.
    pub(crate) fn started(&self) -> bool {
        self.request_line_seen || self.pending > 0
    }

    /// Whether the client asked for the connection to persist, following the version default.
    pub fn wants_keep_alive(&self) -> bool {
        match self.version {
            Version::Http11 => !self.connection_close,
            Version::Http10 => self.connection_keep_alive,
        }
    }

    /// Decode `Authorization: Basic` credentials into `scratch`, returning the user and password.
    pub fn basic_auth<'s>(&self, scratch: &'s mut [u8]) -> Option<(&'s str, &'s str)> {
        let value = self.authorization.as_ref()?;
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = Base64::decode(encoded.trim(), scratch).ok()?;
        let decoded = core::str::from_utf8(decoded).ok()?;
        decoded.split_once(':')
    }

    /// Consume every complete line in `rx`.  Bytes after the last complete line stay at the
    /// front of `rx` as pending input for the next read.  Returns `Ok(())` once the empty line
    /// terminating the header block was consumed; anything after it (a body, or a pipelined
    /// request) is left in `rx`.
    pub(crate) fn parse(&mut self, rx: &mut Buffer<'_>) -> Result<(), RequestError> {
        let data = rx.filled();
        let mut line_start = 0;
        let mut headers_done = false;

        while let Some(pos) = data[line_start..].iter().position(|b| *b == LF) {
            let line_end = line_start + pos;
            let line = match &data[line_start..line_end] {
                [line @ .., CR] => line,
                line => line,
            };
            line_start = line_end + 1;

            if !self.request_line_seen {
                // robustness: ignore blank lines ahead of the request line
                if line.is_empty() {
                    continue;
                }
                self.parse_request_line(line)?;
                self.request_line_seen = true;
            } else if line.is_empty() {
                headers_done = true;
                break;
            } else {
                self.parse_header_line(line)?;
            }
        }

        rx.consume(line_start);
        self.pending = rx.len();

        if headers_done {
            self.pending = 0;
            return Ok(());
        }

        if rx.is_full() {
            return Err(RequestError::Rejected(
                StatusCode::RequestHeaderFieldsTooLarge,
                "header line exceeds buffer",
            ));
        }

        Err(RequestError::Incomplete)
    }

    fn parse_request_line(&mut self, data: &[u8]) -> Result<(), RequestError> {
        let mut words = data.split(|b: &u8| *b == SP).filter(|w| !w.is_empty());

        let (Some(method), Some(target), Some(protocol), None) =
            (words.next(), words.next(), words.next(), words.next())
        else {
            return Err(RequestError::Rejected(
                StatusCode::BadRequest,
                "malformed request line",
            ));
        };

        self.method = Method::try_from(method)
            .or(Err(RequestError::Rejected(StatusCode::NotImplemented, "unknown http method")))?;

        self.version = match protocol {
            b"HTTP/1.1" => Version::Http11,
            b"HTTP/1.0" => Version::Http10,
            [b'H', b'T', b'T', b'P', b'/', ..] => {
                return Err(RequestError::Rejected(
                    StatusCode::HttpVersionNotSupported,
                    "unsupported http version",
                ));
            }
            _ => {
                return Err(RequestError::Rejected(
                    StatusCode::BadRequest,
                    "malformed protocol",
                ));
            }
        };

        let target = core::str::from_utf8(target)
            .or(Err(RequestError::Rejected(StatusCode::BadRequest, "uri is not utf8")))?;
        if !target.starts_with('/') {
            return Err(RequestError::Rejected(
                StatusCode::BadRequest,
                "uri is not an absolute path",
            ));
        }

        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let too_long = RequestError::Rejected(StatusCode::UriTooLong, "uri too long");
        self.path.push_str(path).or(Err(too_long))?;
        self.query
            .push_str(query)
            .or(Err(RequestError::Rejected(StatusCode::UriTooLong, "query too long")))?;
        uri::percent_decode(&mut self.path)
            .or(Err(RequestError::Rejected(StatusCode::BadRequest, "invalid escape in uri")))?;
        uri::normalize(&mut self.path);

        Ok(())
    }

    fn parse_header_line(&mut self, data: &[u8]) -> Result<(), RequestError> {
        let header = RequestHeader::parse(data)
            .map_err(|e| RequestError::Rejected(StatusCode::BadRequest, e))?;

        match header {
            RequestHeader::Host(s) => self.host = Some(copy_field(s)?),
            RequestHeader::ContentLength(n) => self.content_length = Some(n),
            RequestHeader::ContentType(s) => self.content_type = Some(copy_field(s)?),
            RequestHeader::Authorization(s) => self.authorization = Some(copy_field(s)?),
            RequestHeader::Connection(s) => {
                for token in s.split(',').map(str::trim) {
                    if token.eq_ignore_ascii_case("close") {
                        self.connection_close = true;
                    } else if token.eq_ignore_ascii_case("keep-alive") {
                        self.connection_keep_alive = true;
                    } else if token.eq_ignore_ascii_case("upgrade") {
                        self.upgrade.connection_upgrade = true;
                    }
                }
            }
            RequestHeader::Upgrade(s) => {
                self.upgrade.websocket = s
                    .split(',')
                    .map(str::trim)
                    .any(|p| p.eq_ignore_ascii_case("websocket"));
            }
            RequestHeader::SecWebSocketKey(s) => match String::try_from(s) {
                Ok(key) => self.upgrade.key = Some(key),
                Err(_) => self.upgrade.key_malformed = true,
            },
            RequestHeader::SecWebSocketVersion(v) => self.upgrade.version = Some(v),
            RequestHeader::SecWebSocketProtocol(s) => self.upgrade.protocol = Some(copy_field(s)?),
            _ => {}
        }

        Ok(())
    }
}

fn copy_field<const N: usize>(value: &str) -> Result<String<N>, RequestError> {
    String::try_from(value).or(Err(RequestError::Rejected(
        StatusCode::RequestHeaderFieldsTooLarge,
        "header field too large",
    )))
}
