use embedded_io_async::Write;

use crate::ascii::{AsciiInt, COLON, CR, LF, atoi, trim};
use crate::{HttpWrite, WriteError};

/// Host
pub const REQ_HEAD_HOST: &str = "Host";
/// Connection
pub const REQ_HEAD_CONNECTION: &str = "Connection";
/// Content-Length
pub const REQ_HEAD_CONTENT_LENGTH: &str = "Content-Length";
/// Content-Type
pub const REQ_HEAD_CONTENT_TYPE: &str = "Content-Type";
/// Authorization
pub const REQ_HEAD_AUTHORIZATION: &str = "Authorization";
/// Upgrade
pub const REQ_HEAD_UPGRADE: &str = "Upgrade";
/// Sec-WebSocket-Key
pub const REQ_HEAD_SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";
/// Sec-WebSocket-Version
pub const REQ_HEAD_SEC_WEBSOCKET_VERSION: &str = "Sec-WebSocket-Version";
/// Sec-WebSocket-Protocol
pub const REQ_HEAD_SEC_WEBSOCKET_PROTOCOL: &str = "Sec-WebSocket-Protocol";

/// Request headers the session recognises.  Everything else is reported as `Other` and ignored.
#[allow(missing_docs)]
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RequestHeader<'a> {
    Host(&'a str),
    Connection(&'a str),
    ContentLength(usize),
    ContentType(&'a str),
    Authorization(&'a str),
    Upgrade(&'a str),
    SecWebSocketKey(&'a str),
    SecWebSocketVersion(u8),
    SecWebSocketProtocol(&'a str),
    Other(&'a str, &'a str),
}

impl<'a> TryFrom<(&'a str, &'a str)> for RequestHeader<'a> {
    type Error = &'static str;

    fn try_from(value: (&'a str, &'a str)) -> Result<Self, Self::Error> {
        let (name, val) = value;
        let is = |known: &str| name.eq_ignore_ascii_case(known);

        match name {
            _ if is(REQ_HEAD_HOST) => Ok(RequestHeader::Host(val)),
            _ if is(REQ_HEAD_CONNECTION) => Ok(RequestHeader::Connection(val)),
            _ if is(REQ_HEAD_CONTENT_LENGTH) => Ok(RequestHeader::ContentLength(
                atoi(val.as_bytes()).ok_or("invalid content-length")? as usize,
            )),
            _ if is(REQ_HEAD_CONTENT_TYPE) => Ok(RequestHeader::ContentType(val)),
            _ if is(REQ_HEAD_AUTHORIZATION) => Ok(RequestHeader::Authorization(val)),
            _ if is(REQ_HEAD_UPGRADE) => Ok(RequestHeader::Upgrade(val)),
            _ if is(REQ_HEAD_SEC_WEBSOCKET_KEY) => Ok(RequestHeader::SecWebSocketKey(val)),
            _ if is(REQ_HEAD_SEC_WEBSOCKET_VERSION) => {
                let version = atoi(val.as_bytes()).ok_or("invalid sec-websocket-version")?;
                Ok(RequestHeader::SecWebSocketVersion(
                    u8::try_from(version).unwrap_or(u8::MAX),
                ))
            }
            _ if is(REQ_HEAD_SEC_WEBSOCKET_PROTOCOL) => {
                Ok(RequestHeader::SecWebSocketProtocol(val))
            }
            _ => Ok(RequestHeader::Other(name, val)),
        }
    }
}

impl<'a> RequestHeader<'a> {
    /// Parse a single `Name: value` header line (without the line terminator).
    pub fn parse(line: &'a [u8]) -> Result<Self, &'static str> {
        let colon = line
            .iter()
            .position(|b| *b == COLON)
            .ok_or("header line without colon")?;
        let name = core::str::from_utf8(trim(&line[..colon])).or(Err("header is not utf8"))?;
        let value =
            core::str::from_utf8(trim(&line[colon + 1..])).or(Err("header is not utf8"))?;

        if name.is_empty() || name.bytes().any(|b| b == b' ' || b == b'\t') {
            return Err("malformed header name");
        }

        RequestHeader::try_from((name, value))
    }
}

/// Cache-Control
pub const RESP_HEAD_CACHE_CONTROL: &str = "Cache-Control";
/// Connection
pub const RESP_HEAD_CONNECTION: &str = "Connection";
/// Content-Length
pub const RESP_HEAD_CONTENT_LENGTH: &str = "Content-Length";
/// Content-Type
pub const RESP_HEAD_CONTENT_TYPE: &str = "Content-Type";
/// Server
pub const RESP_HEAD_SERVER: &str = "Server";
/// Transfer-Encoding
pub const RESP_HEAD_TRANSFER_ENCODING: &str = "Transfer-Encoding";
/// Upgrade
pub const RESP_HEAD_UPGRADE: &str = "Upgrade";
/// Sec-WebSocket-Accept
pub const RESP_HEAD_SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";
/// Sec-WebSocket-Protocol
pub const RESP_HEAD_SEC_WEBSOCKET_PROTOCOL: &str = "Sec-WebSocket-Protocol";
/// Sec-WebSocket-Version
pub const RESP_HEAD_SEC_WEBSOCKET_VERSION: &str = "Sec-WebSocket-Version";
/// WWW-Authenticate
pub const RESP_HEAD_WWW_AUTHENTICATE: &str = "WWW-Authenticate";

#[allow(missing_docs)]
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResponseHeader<'a> {
    CacheControl(&'a str),
    Connection(&'a str),
    ContentLength(usize),
    ContentType(&'a str),
    Server(&'a str),
    TransferEncoding(&'a str),
    Upgrade(&'a str),
    SecWebSocketAccept([u8; 28]),
    SecWebSocketProtocol(&'a str),
    SecWebSocketVersion(u8),
    /// `Basic` challenge for the named realm
    WwwAuthenticate(&'a str),
}

impl<'a> ResponseHeader<'a> {
    fn name(&self) -> &'a str {
        match self {
            Self::CacheControl(_) => RESP_HEAD_CACHE_CONTROL,
            Self::Connection(_) => RESP_HEAD_CONNECTION,
            Self::ContentLength(_) => RESP_HEAD_CONTENT_LENGTH,
            Self::ContentType(_) => RESP_HEAD_CONTENT_TYPE,
            Self::Server(_) => RESP_HEAD_SERVER,
            Self::TransferEncoding(_) => RESP_HEAD_TRANSFER_ENCODING,
            Self::Upgrade(_) => RESP_HEAD_UPGRADE,
            Self::SecWebSocketAccept(_) => RESP_HEAD_SEC_WEBSOCKET_ACCEPT,
            Self::SecWebSocketProtocol(_) => RESP_HEAD_SEC_WEBSOCKET_PROTOCOL,
            Self::SecWebSocketVersion(_) => RESP_HEAD_SEC_WEBSOCKET_VERSION,
            Self::WwwAuthenticate(_) => RESP_HEAD_WWW_AUTHENTICATE,
        }
    }
}

impl<'a> HttpWrite for ResponseHeader<'a> {
    async fn write<T: Write>(self, writer: &mut T) -> Result<(), WriteError> {
        let int: AsciiInt;
        let ws_accept: [u8; 28];

        let val = match self {
            Self::ContentLength(0) => return Ok(()),
            Self::ContentLength(n) => {
                int = AsciiInt::from(n as u64);
                int.as_str()
            }
            Self::SecWebSocketVersion(v) => {
                int = AsciiInt::from(v as u64);
                int.as_str()
            }
            Self::SecWebSocketAccept(s) => {
                ws_accept = s;
                core::str::from_utf8(&ws_accept).or(Err(WriteError::NetworkError))?
            }
            Self::CacheControl(s)
            | Self::Connection(s)
            | Self::ContentType(s)
            | Self::Server(s)
            | Self::TransferEncoding(s)
            | Self::Upgrade(s)
            | Self::SecWebSocketProtocol(s) => s,
            Self::WwwAuthenticate(realm) => {
                return writer
                    .write_all(RESP_HEAD_WWW_AUTHENTICATE.as_bytes())
                    .await
                    .and(writer.write_all(b": Basic realm=\"").await)
                    .and(writer.write_all(realm.as_bytes()).await)
                    .and(writer.write_all(&[b'"', CR, LF]).await)
                    .or(Err(WriteError::NetworkError));
            }
        };

        writer
            .write_all(self.name().as_bytes())
            .await
            .and(writer.write_all(": ".as_bytes()).await)
            .and(writer.write_all(val.as_bytes()).await)
            .and(writer.write_all(&[CR, LF]).await)
            .or(Err(WriteError::NetworkError))
    }
}
