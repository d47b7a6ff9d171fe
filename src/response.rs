use embedded_io_async::Write;

use crate::ascii::{AsciiHex, AsciiInt, CR, LF, SP};
use crate::header::ResponseHeader;
use crate::ssi::SsiScanner;
use crate::{HttpWrite, WriteError};

const HTTP_PROTO: &str = "HTTP/1.1";

/// HTTP status code returned in a response
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum StatusCode {
    Continue,
    SwitchingProtocols,
    OK,
    Created,
    Accepted,
    NonAuthoritativeInformation,
    NoContent,
    ResetContent,
    PartialContent,
    MultipleChoices,
    MovedPermanently,
    Found,
    SeeOther,
    NotModified,
    UseProxy,
    TemporaryRedirect,
    BadRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    ProxyAuthenticationRequired,
    RequestTimeout,
    Conflict,
    Gone,
    LengthRequired,
    PreconditionFailed,
    PayloadTooLarge,
    UriTooLong,
    UnsupportedMediaType,
    RangeNotSatisfiable,
    ExpectationFailed,
    UpgradeRequired,
    RequestHeaderFieldsTooLarge,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    HttpVersionNotSupported,
}

impl StatusCode {
    /// Numeric status code
    #[rustfmt::skip]
    pub fn code(self) -> u16 {
        match self {
            Self::Continue => 100,
            Self::SwitchingProtocols => 101,
            Self::OK => 200,
            Self::Created => 201,
            Self::Accepted => 202,
            Self::NonAuthoritativeInformation => 203,
            Self::NoContent => 204,
            Self::ResetContent => 205,
            Self::PartialContent => 206,
            Self::MultipleChoices => 300,
            Self::MovedPermanently => 301,
            Self::Found => 302,
            Self::SeeOther => 303,
            Self::NotModified => 304,
            Self::UseProxy => 305,
            Self::TemporaryRedirect => 307,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::PaymentRequired => 402,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::NotAcceptable => 406,
            Self::ProxyAuthenticationRequired => 407,
            Self::RequestTimeout => 408,
            Self::Conflict => 409,
            Self::Gone => 410,
            Self::LengthRequired => 411,
            Self::PreconditionFailed => 412,
            Self::PayloadTooLarge => 413,
            Self::UriTooLong => 414,
            Self::UnsupportedMediaType => 415,
            Self::RangeNotSatisfiable => 416,
            Self::ExpectationFailed => 417,
            Self::UpgradeRequired => 426,
            Self::RequestHeaderFieldsTooLarge => 431,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
            Self::BadGateway => 502,
            Self::ServiceUnavailable => 503,
            Self::GatewayTimeout => 504,
            Self::HttpVersionNotSupported => 505,
        }
    }

    /// Reason phrase sent on the status line
    #[rustfmt::skip]
    pub fn reason(self) -> &'static str {
        match self {
            Self::Continue => "Continue",
            Self::SwitchingProtocols => "Switching Protocols",
            Self::OK => "OK",
            Self::Created => "Created",
            Self::Accepted => "Accepted",
            Self::NonAuthoritativeInformation => "Non-Authoritative Information",
            Self::NoContent => "No Content",
            Self::ResetContent => "Reset Content",
            Self::PartialContent => "Partial Content",
            Self::MultipleChoices => "Multiple Choices",
            Self::MovedPermanently => "Moved Permanently",
            Self::Found => "Found",
            Self::SeeOther => "See Other",
            Self::NotModified => "Not Modified",
            Self::UseProxy => "Use Proxy",
            Self::TemporaryRedirect => "Temporary Redirect",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::PaymentRequired => "Payment Required",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::NotAcceptable => "Not Acceptable",
            Self::ProxyAuthenticationRequired => "Proxy Authentication Required",
            Self::RequestTimeout => "Request Timeout",
            Self::Conflict => "Conflict",
            Self::Gone => "Gone",
            Self::LengthRequired => "Length Required",
            Self::PreconditionFailed => "Precondition Failed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::UriTooLong => "URI Too Long",
            Self::UnsupportedMediaType => "Unsupported Media Type",
            Self::RangeNotSatisfiable => "Range Not Satisfiable",
            Self::ExpectationFailed => "Expectation Failed",
            Self::UpgradeRequired => "Upgrade Required",
            Self::RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::BadGateway => "Bad Gateway",
            Self::ServiceUnavailable => "Service Unavailable",
            Self::GatewayTimeout => "Gateway Timeout",
            Self::HttpVersionNotSupported => "HTTP Version Not Supported",
        }
    }

    /// True for 4xx and 5xx codes
    pub fn is_error(self) -> bool {
        self.code() >= 400
    }
}

impl HttpWrite for StatusCode {
    #[rustfmt::skip]
    async fn write<T: Write>(self, writer: &mut T) -> Result<(), WriteError> {
        let code = AsciiInt::from(self.code() as u64);

        writer.write_all(HTTP_PROTO.as_bytes()).await
            .and(writer.write_all(&[SP]).await)
            .and(writer.write_all(code.as_str().as_bytes()).await)
            .and(writer.write_all(&[SP]).await)
            .and(writer.write_all(self.reason().as_bytes()).await)
            .and(writer.write_all(&[CR, LF]).await)
            .or(Err(WriteError::NetworkError))
    }
}

const ERROR_PAGE: [&str; 3] = [
    "<html><head><title>",
    "</title></head><body><h1>",
    "</h1></body></html>",
];

/// Length of the generated error page for `status`.
pub(crate) fn error_page_len(status: StatusCode) -> usize {
    let title = 4 + status.reason().len();
    ERROR_PAGE.iter().map(|s| s.len()).sum::<usize>() + 2 * title
}

/// Write the generated error page for `status`.
pub(crate) async fn write_error_page<W: Write>(
    status: StatusCode,
    body: &mut BodyWriter<'_, W>,
) -> Result<(), WriteError> {
    let code = AsciiInt::from(status.code() as u64);
    body.write(ERROR_PAGE[0].as_bytes()).await?;
    for part in [ERROR_PAGE[1], ERROR_PAGE[2]] {
        body.write(code.as_str().as_bytes()).await?;
        body.write(&[SP]).await?;
        body.write(status.reason().as_bytes()).await?;
        body.write(part.as_bytes()).await?;
    }
    Ok(())
}

/// Where the response body comes from.
pub(crate) enum Body<F> {
    Empty,
    File(F),
    /// CGI output, held at the start of the receive region's spare bytes
    Cgi(usize),
    ErrorPage,
}

/// Websocket handshake fields of a `101` response
pub(crate) struct UpgradeResponse {
    pub(crate) accept: [u8; 28],
    pub(crate) protocol: Option<&'static str>,
}

/// The response being produced for the current request.
pub(crate) struct Response<F> {
    pub(crate) status: StatusCode,
    pub(crate) content_type: Option<&'static str>,
    pub(crate) content_length: Option<usize>,
    pub(crate) cache_control: Option<&'static str>,
    pub(crate) body: Body<F>,
    /// lookahead for server side include scanning, present when the resource is script enabled
    pub(crate) ssi: Option<SsiScanner>,
    pub(crate) upgrade: Option<UpgradeResponse>,
    /// Sec-WebSocket-Version the server speaks, sent when it differs from the client's
    pub(crate) required_version: Option<u8>,
    /// realm challenged with a `401`
    pub(crate) realm: Option<&'static str>,
}

impl<F> Response<F> {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            content_length: None,
            cache_control: None,
            body: Body::Empty,
            ssi: None,
            upgrade: None,
            required_version: None,
            realm: None,
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::new();
    }

    /// Answer with the generated error page.
    pub(crate) fn error(&mut self, status: StatusCode) {
        self.clear();
        self.status = status;
        self.content_type = Some("text/html");
        self.content_length = Some(error_page_len(status));
        self.body = Body::ErrorPage;
    }

    /// Status line and headers, terminated by the empty line.
    pub(crate) async fn write_head<W: Write>(
        &self,
        writer: &mut W,
        head: &Head,
    ) -> Result<(), WriteError> {
        self.status.write(writer).await?;

        if let Some(server) = head.server {
            ResponseHeader::Server(server).write(writer).await?;
        }

        let connection = match (&self.upgrade, head.keep_alive) {
            (Some(_), _) => "Upgrade",
            (None, true) => "keep-alive",
            (None, false) => "close",
        };
        ResponseHeader::Connection(connection).write(writer).await?;

        if let Some(upgrade) = &self.upgrade {
            ResponseHeader::Upgrade("WebSocket").write(writer).await?;
            ResponseHeader::SecWebSocketAccept(upgrade.accept)
                .write(writer)
                .await?;
            if let Some(protocol) = upgrade.protocol {
                ResponseHeader::SecWebSocketProtocol(protocol)
                    .write(writer)
                    .await?;
            }
        }

        if let Some(version) = self.required_version {
            ResponseHeader::SecWebSocketVersion(version)
                .write(writer)
                .await?;
        }

        if let Some(realm) = self.realm {
            ResponseHeader::WwwAuthenticate(realm).write(writer).await?;
        }

        if let Some(content_type) = self.content_type {
            ResponseHeader::ContentType(content_type)
                .write(writer)
                .await?;
        }

        if let Some(cache_control) = self.cache_control {
            ResponseHeader::CacheControl(cache_control)
                .write(writer)
                .await?;
        }

        if let Some(len) = self.content_length {
            ResponseHeader::ContentLength(len).write(writer).await?;
        }

        if head.chunked {
            ResponseHeader::TransferEncoding("chunked")
                .write(writer)
                .await?;
        }

        writer
            .write_all(&[CR, LF])
            .await
            .or(Err(WriteError::NetworkError))
    }
}

/// Session level facts that shape the response head.
pub(crate) struct Head {
    pub(crate) server: Option<&'static str>,
    pub(crate) keep_alive: bool,
    pub(crate) chunked: bool,
}

/// Writes body bytes, optionally applying chunked transfer encoding.
pub(crate) struct BodyWriter<'w, W> {
    inner: &'w mut W,
    chunked: bool,
}

impl<'w, W: Write> BodyWriter<'w, W> {
    pub(crate) fn new(inner: &'w mut W, chunked: bool) -> Self {
        Self { inner, chunked }
    }

    pub(crate) async fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        if data.is_empty() {
            return Ok(());
        }

        let res = if self.chunked {
            let size = AsciiHex::from(data.len());
            self.inner
                .write_all(size.as_bytes())
                .await
                .and(self.inner.write_all(&[CR, LF]).await)
                .and(self.inner.write_all(data).await)
                .and(self.inner.write_all(&[CR, LF]).await)
        } else {
            self.inner.write_all(data).await
        };

        res.or(Err(WriteError::NetworkError))
    }

    /// Terminate the body and push everything staged to the client.
    pub(crate) async fn finish(self) -> Result<(), WriteError> {
        if self.chunked {
            self.inner
                .write_all(b"0\r\n\r\n")
                .await
                .or(Err(WriteError::NetworkError))?;
        }
        self.inner.flush().await.or(Err(WriteError::NetworkError))
    }
}
