//! The per-connection HTTP state machine.
//!
//! ```text
//! WaitRequest -> ProcessRequest -> Respond -> EndRequest -+-> WaitRequest (keep-alive)
//!      |                              ^                   +-> Close
//!      +---- rejected request --------+                   +-> Upgrade (websocket)
//! ```
//!
//! Every state is driven from one loop that also enforces the idle timeout: the first request
//! must complete within `Config::request_timeout` and later ones within
//! `Config::keep_alive_timeout`, otherwise the session closes whatever state it is in.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_io_async::{Error, ErrorKind, Read, Write};
use heapless::String;

use crate::arena::{Arena, Buffer, BufferedWriter};
use crate::clock::Clock;
use crate::config::millis;
use crate::fs::{File, FileSystem};
use crate::handler::Handler;
use crate::mime::{self, CACHE_FOREVER, CACHE_NONE};
use crate::request::{AUTH_MAX, Method, PATH_MAX, Request, RequestError, Version};
use crate::response::{
    Body, BodyWriter, Head, Response, StatusCode, UpgradeResponse, write_error_page,
};
use crate::server::{Server, ServerError};
use crate::ssi::{SsiEvent, SsiScanner};
use crate::websocket::{accept_token, key_is_valid, select_protocol};
use crate::{Connection, WriteError, uri};

/// Bytes of a file read per step when the body is transformed on the way out.
const FILE_CHUNK: usize = 128;
/// Largest expansion of a single include tag.
const SSI_OUTPUT_MAX: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum HttpState {
    WaitRequest,
    ProcessRequest,
    Respond,
    EndRequest,
    Upgrade,
    Close,
}

#[derive(Default)]
struct Flags {
    /// the connection persists after this request
    keep_alive: bool,
    /// a 101 response is being sent
    upgrade: bool,
    /// the header block of the current request was parsed
    headers_done: bool,
}

/// How a session ended.
pub(crate) enum SessionEnd<'s, C> {
    Closed,
    /// The connection now speaks websocket; the receive and transmit regions are handed over
    Upgraded {
        conn: &'s mut C,
        rx: &'s mut [u8],
        tx: &'s mut [u8],
        path: String<PATH_MAX>,
    },
}

pub(crate) struct Session<'s, M: RawMutex, H, F: FileSystem, K, C> {
    server: &'s Server<M, H, F, K>,
    conn: &'s mut C,
    rx: Buffer<'s>,
    tx: Buffer<'s>,
    state: HttpState,
    request: Request,
    response: Response<F::File>,
    flags: Flags,
    last_activity: u64,
    timeout_ms: u64,
}

impl<'s, M, H, F, K, C> Session<'s, M, H, F, K, C>
where
    M: RawMutex,
    H: Handler,
    F: FileSystem,
    K: Clock,
    C: Connection,
{
    pub(crate) fn new(server: &'s Server<M, H, F, K>, conn: &'s mut C, arena: Arena<'s>) -> Self {
        Self {
            server,
            conn,
            rx: arena.rx,
            tx: arena.tx,
            state: HttpState::WaitRequest,
            request: Request::new(),
            response: Response::new(),
            flags: Flags::default(),
            last_activity: server.clock.now_ms(),
            timeout_ms: millis(server.config.request_timeout),
        }
    }

    pub(crate) async fn run(mut self) -> Result<SessionEnd<'s, C>, ServerError> {
        loop {
            if self.state != HttpState::Close
                && self.server.clock.elapsed_ms(self.last_activity) > self.timeout_ms
            {
                if self.request.started() {
                    debug!("session timed out inside a request");
                } else {
                    debug!("session idle timeout");
                }
                self.state = HttpState::Close;
            }

            trace!("http state {}", self.state);
            self.state = match self.state {
                HttpState::WaitRequest => self.wait_request().await?,
                HttpState::ProcessRequest => self.process_request(),
                HttpState::Respond => self.respond().await?,
                HttpState::EndRequest => self.end_request(),
                HttpState::Upgrade => return Ok(self.into_upgrade()),
                HttpState::Close => {
                    let _ = self.conn.flush().await;
                    return Ok(SessionEnd::Closed);
                }
            };
        }
    }

    fn into_upgrade(self) -> SessionEnd<'s, C> {
        let Session {
            conn,
            rx,
            tx,
            request,
            ..
        } = self;

        SessionEnd::Upgraded {
            conn,
            rx: rx.into_inner(),
            tx: tx.into_inner(),
            path: request.path,
        }
    }

    async fn receive(&mut self) -> Result<HttpState, ServerError> {
        match self.conn.read(self.rx.spare_mut()).await {
            Ok(0) => {
                debug!("peer closed the connection");
                Ok(HttpState::Close)
            }
            Ok(n) => {
                self.rx.advance(n);
                self.last_activity = self.server.clock.now_ms();
                Ok(HttpState::WaitRequest)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(HttpState::WaitRequest),
            Err(_) => Err(ServerError::NetworkError),
        }
    }

    async fn wait_request(&mut self) -> Result<HttpState, ServerError> {
        if !self.flags.headers_done {
            match self.request.parse(&mut self.rx) {
                Ok(()) => self.flags.headers_done = true,
                Err(RequestError::Incomplete) => return self.receive().await,
                Err(RequestError::Rejected(status, _reason)) => {
                    warn!("request rejected: {}", _reason);
                    self.reject(status);
                    return Ok(HttpState::Respond);
                }
            }
        }

        let body_len = self.request.content_length.unwrap_or(0);
        if body_len > self.rx.capacity() {
            warn!("request body of {} bytes exceeds buffer", body_len);
            self.reject(StatusCode::PayloadTooLarge);
            return Ok(HttpState::Respond);
        }
        if self.rx.len() >= body_len {
            return Ok(HttpState::ProcessRequest);
        }

        self.receive().await
    }

    /// Answer with an error page and drop the connection afterwards; used when the rest of the
    /// byte stream cannot be trusted to start a new request.
    fn reject(&mut self, status: StatusCode) {
        self.response.error(status);
        self.flags.keep_alive = false;
    }

    fn process_request(&mut self) -> HttpState {
        let server = self.server;
        let config = &server.config;
        self.flags.keep_alive =
            config.keep_alive && self.request.wants_keep_alive() && !server.last_slot();

        debug!("{} {}", self.request.method, self.request.path.as_str());

        if self.request.version == Version::Http11 && self.request.host.is_none() {
            self.response.error(StatusCode::BadRequest);
            return HttpState::Respond;
        }

        if self.request.method == Method::POST && self.request.content_length.is_none() {
            self.reject(StatusCode::LengthRequired);
            return HttpState::Respond;
        }

        if let Some(realm) = self.unauthorized_realm() {
            warn!("credentials required for realm {}", realm);
            self.response.error(StatusCode::Unauthorized);
            self.response.realm = Some(realm);
            return HttpState::Respond;
        }

        if self.request.upgrade.requested() {
            self.process_upgrade();
            return HttpState::Respond;
        }

        if let Some(suffix) = config.cgi_suffix
            && self.request.path.ends_with(suffix)
        {
            self.process_cgi();
            return HttpState::Respond;
        }

        if !matches!(self.request.method, Method::GET | Method::HEAD) {
            self.response.error(StatusCode::MethodNotAllowed);
            return HttpState::Respond;
        }

        if uri::with_index(&mut self.request.path, config.index_page).is_err() {
            self.response.error(StatusCode::UriTooLong);
            return HttpState::Respond;
        }

        let Some(file) = server.fs.open(&self.request.path) else {
            self.response.error(StatusCode::NotFound);
            return HttpState::Respond;
        };

        let entry = mime::lookup(&self.request.path);
        self.response.status = StatusCode::OK;
        self.response.content_type = Some(entry.mime);
        self.response.cache_control = Some(if entry.cacheable {
            CACHE_FOREVER
        } else {
            CACHE_NONE
        });
        if entry.ssi {
            // expansion changes the length
            self.response.ssi = Some(SsiScanner::new());
        } else {
            self.response.content_length = file.len();
        }
        self.response.body = Body::File(file);

        HttpState::Respond
    }

    /// Name of the realm guarding the path when the request lacks valid credentials for it.
    fn unauthorized_realm(&self) -> Option<&'static str> {
        let path = self.request.path.as_str();
        let realm = self.server.config.auth_realms.iter().find(|r| r.covers(path))?;

        let mut scratch = [0u8; AUTH_MAX];
        match self.request.basic_auth(&mut scratch) {
            Some((user, password)) if realm.accepts(user, password) => None,
            _ => Some(realm.name),
        }
    }

    fn process_upgrade(&mut self) {
        match self.check_upgrade() {
            Ok(upgrade) => {
                info!("websocket upgrade for {}", self.request.path.as_str());
                let supported = self.server.config.websocket.max_version;
                self.response.status = StatusCode::SwitchingProtocols;
                self.response.upgrade = Some(upgrade);
                if self.request.upgrade.version != Some(supported) {
                    self.response.required_version = Some(supported);
                }
                self.flags.upgrade = true;
            }
            Err(status) => {
                warn!("websocket upgrade refused: {}", status);
                self.reject(status);
                if status == StatusCode::UpgradeRequired {
                    self.response.required_version = Some(self.server.config.websocket.max_version);
                }
            }
        }
    }

    fn check_upgrade(&self) -> Result<UpgradeResponse, StatusCode> {
        let request = &self.request;
        let upgrade = &request.upgrade;

        if request.method != Method::GET || !upgrade.websocket || !upgrade.connection_upgrade {
            return Err(StatusCode::BadRequest);
        }

        match upgrade.version {
            None => return Err(StatusCode::BadRequest),
            Some(v) if v > self.server.config.websocket.max_version => {
                return Err(StatusCode::UpgradeRequired);
            }
            Some(_) => {}
        }

        let key = match &upgrade.key {
            Some(key) if !upgrade.key_malformed && key_is_valid(key) => key,
            _ => return Err(StatusCode::BadRequest),
        };

        let handler = &self.server.handler;
        if !handler.websocket_accepts(&request.path) {
            return Err(StatusCode::NotFound);
        }

        // frames must not arrive before the handshake completes
        if !self.rx.is_empty() {
            return Err(StatusCode::BadRequest);
        }

        let accept = accept_token(key).or(Err(StatusCode::InternalServerError))?;
        let protocol = select_protocol(
            upgrade.protocol.as_deref(),
            handler.websocket_protocol(&request.path),
        );

        Ok(UpgradeResponse { accept, protocol })
    }

    fn process_cgi(&mut self) {
        let body_len = self.request.content_length.unwrap_or(0);
        let (filled, spare) = self.rx.split_mut();
        let spare_len = spare.len();

        match self
            .server
            .handler
            .cgi(&self.request, &filled[..body_len], spare)
        {
            Ok(cgi) => {
                let len = cgi.len.min(spare_len);
                self.response.status = cgi.status;
                self.response.content_type = Some(cgi.content_type);
                self.response.cache_control = Some(CACHE_NONE);
                self.response.content_length = Some(len);
                self.response.body = Body::Cgi(len);
            }
            Err(status) => self.response.error(status),
        }
    }

    async fn respond(&mut self) -> Result<HttpState, ServerError> {
        let status = self.response.status;
        let head_only = self.request.method == Method::HEAD
            || self.flags.upgrade
            || matches!(status, StatusCode::NoContent | StatusCode::NotModified);
        let length_known =
            self.response.content_length.is_some() || matches!(self.response.body, Body::Empty);

        // HTTP/1.0 has no chunked encoding: the end of the body is the end of the connection
        let chunked = !length_known && self.request.version == Version::Http11;
        if !length_known && !chunked {
            self.flags.keep_alive = false;
        }

        let head = Head {
            server: self.server.config.server_name,
            keep_alive: self.flags.keep_alive,
            chunked,
        };

        let mut writer = BufferedWriter::new(&mut self.tx, &mut *self.conn);
        self.response.write_head(&mut writer, &head).await?;

        let body = core::mem::replace(&mut self.response.body, Body::Empty);
        let mut out = BodyWriter::new(&mut writer, chunked && !head_only);
        if !head_only {
            match body {
                Body::Empty => {}
                Body::ErrorPage => write_error_page(status, &mut out).await?,
                Body::Cgi(len) => out.write(&self.rx.spare()[..len]).await?,
                Body::File(mut file) => {
                    let ssi = self.response.ssi.take();
                    stream_file(&mut file, ssi, &self.server.handler, &mut out).await?;
                }
            }
        }
        out.finish().await?;

        Ok(HttpState::EndRequest)
    }

    fn end_request(&mut self) -> HttpState {
        if self.flags.upgrade {
            return HttpState::Upgrade;
        }
        if !self.flags.keep_alive {
            return HttpState::Close;
        }

        // anything after the body is the next, pipelined request
        self.rx.consume(self.request.content_length.unwrap_or(0));
        self.request = Request::new();
        self.response.clear();
        self.flags = Flags::default();
        self.timeout_ms = millis(self.server.config.keep_alive_timeout);
        self.last_activity = self.server.clock.now_ms();

        HttpState::WaitRequest
    }
}

/// Copy a file into the body, expanding include tags when `ssi` is set.
async fn stream_file<W: Write, H: Handler>(
    file: &mut impl File,
    mut ssi: Option<SsiScanner>,
    handler: &H,
    out: &mut BodyWriter<'_, W>,
) -> Result<(), WriteError> {
    let mut chunk = [0u8; FILE_CHUNK];
    let mut expansion = [0u8; SSI_OUTPUT_MAX];

    loop {
        let n = file.read(&mut chunk);
        if n == 0 {
            break;
        }

        let Some(scanner) = ssi.as_mut() else {
            out.write(&chunk[..n]).await?;
            continue;
        };

        let mut input = &chunk[..n];
        while let Some(event) = scanner.next(&mut input) {
            match event {
                SsiEvent::Literal(bytes) => out.write(bytes).await?,
                SsiEvent::Held(bytes) => out.write(bytes).await?,
                SsiEvent::Tag(name) => {
                    let len = handler.ssi(name, &mut expansion).min(SSI_OUTPUT_MAX);
                    out.write(&expansion[..len]).await?;
                }
            }
        }
    }

    if let Some(scanner) = ssi.as_mut() {
        out.write(scanner.finish()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate std;
    use core::time::Duration;
    use std::string::String;
    use std::vec;

    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    use super::*;
    use crate::config::{AuthRealm, Config};
    use crate::fs::StaticFs;
    use crate::handler::CgiResponse;
    use crate::testutil::{MockConnection, Step, StepClock};
    use crate::websocket::CommandQueue;

    static FILES: &[(&str, &[u8])] = &[
        ("/index.html", b"<h1>hi</h1>"),
        ("/app.css", b"body{}"),
        ("/status.shtml", b"T=<% temp %>C"),
        ("/my page.html", b"spaced"),
    ];

    static REALMS: &[AuthRealm] = &[AuthRealm {
        path: "/app",
        name: "device",
        users: &[("admin", "secret")],
    }];

    struct Site;

    impl Handler for Site {
        fn cgi(&self, request: &Request, body: &[u8], out: &mut [u8]) -> Result<CgiResponse, StatusCode> {
            if request.path.as_str() != "/echo.cgi" {
                return Err(StatusCode::NotFound);
            }
            out[..body.len()].copy_from_slice(body);
            Ok(CgiResponse {
                status: StatusCode::OK,
                content_type: "text/plain",
                len: body.len(),
            })
        }

        fn ssi(&self, name: &str, out: &mut [u8]) -> usize {
            match name {
                "temp" => {
                    out[..2].copy_from_slice(b"21");
                    2
                }
                _ => 0,
            }
        }

        fn websocket_accepts(&self, path: &str) -> bool {
            path == "/ws"
        }
    }

    type TestServer = Server<CriticalSectionRawMutex, Site, StaticFs<'static>, StepClock>;

    fn server(config: Config, clock_step: u64) -> TestServer {
        Server::new(Site, StaticFs::new(FILES), StepClock::new(clock_step), config)
    }

    async fn exchange(server: &TestServer, conn: &mut MockConnection) -> (Result<(), ServerError>, String) {
        let queue: CommandQueue<CriticalSectionRawMutex, 2, 64> = CommandQueue::new();
        let mut buffer = [0u8; 1024];
        let slot = server.reserve().await;
        let result = server.serve(slot, conn, &mut buffer, &queue).await;
        (result, String::from_utf8_lossy(conn.written()).into_owned())
    }

    async fn get(chunks: &[&[u8]]) -> String {
        let mut conn = MockConnection::from_chunks(chunks);
        let (result, written) = exchange(&server(Config::default(), 0), &mut conn).await;
        assert_eq!(result, Ok(()));
        assert!(conn.shutdown);
        written
    }

    #[tokio::test]
    async fn test_get_static_file() {
        let written = get(&[b"GET / HTTP/1.1\r\nHost: device\r\n\r\n"]).await;
        assert_eq!(
            written,
            "HTTP/1.1 200 OK\r
Connection: keep-alive\r
Content-Type: text/html\r
Cache-Control: no-store, no-cache, must-revalidate\r
Content-Length: 11\r
\r
<h1>hi</h1>"
        );
    }

    #[tokio::test]
    async fn test_request_split_across_reads() {
        let written = get(&[
            b"GET /index.h",
            b"tml HTTP/1.1\r\nHo",
            b"st: device\r\n",
            b"\r\n",
        ])
        .await;
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.ends_with("\r\n\r\n<h1>hi</h1>"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let written = get(&[b"GET /missing HTTP/1.1\r\nHost: device\r\n\r\n"]).await;
        assert!(written.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(written.contains("Content-Length: 89\r\n"));
        assert!(written.ends_with("<h1>404 Not Found</h1></body></html>"));
    }

    #[tokio::test]
    async fn test_pipelined_requests_on_kept_alive_connection() {
        let written = get(&[b"GET /app.css HTTP/1.1\r\nHost: device\r\n\r\n\
            GET / HTTP/1.1\r\nHost: device\r\nConnection: close\r\n\r\n"])
        .await;

        assert_eq!(written.matches("HTTP/1.1 200 OK\r\n").count(), 2);
        assert!(written.contains("Cache-Control: max-age=31536000\r\n"));
        assert!(written.contains("body{}HTTP/1.1 200 OK\r\nConnection: close\r\n"));
    }

    #[tokio::test]
    async fn test_last_slot_closes_after_response() {
        let mut conn = MockConnection::from_chunks(&[b"GET / HTTP/1.1\r\nHost: device\r\n\r\n\
            GET / HTTP/1.1\r\nHost: device\r\n\r\n"]);
        let config = Config::default().with_max_sessions(1);
        let (result, written) = exchange(&server(config, 0), &mut conn).await;

        assert_eq!(result, Ok(()));
        assert_eq!(written.matches("HTTP/1.1 200 OK\r\n").count(), 1);
        assert!(written.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn test_idle_reservation_does_not_disable_keep_alive() {
        let site = server(Config::default().with_max_sessions(2), 0);
        // another worker waiting in accept
        let _idle = site.reserve().await;
        let mut conn = MockConnection::from_chunks(&[b"GET / HTTP/1.1\r\nHost: device\r\n\r\n\
            GET / HTTP/1.1\r\nHost: device\r\n\r\n"]);

        let (result, written) = exchange(&site, &mut conn).await;

        assert_eq!(result, Ok(()));
        assert_eq!(written.matches("HTTP/1.1 200 OK\r\n").count(), 2);
        assert!(!written.contains("Connection: close"));
    }

    #[tokio::test]
    async fn test_auth_realm_requires_credentials() {
        let site = server(Config::default().with_auth_realms(REALMS), 0);
        let cases: [(&[u8], &str); 4] = [
            (b"GET /app.css HTTP/1.1\r\nHost: d\r\n\r\n", "401 Unauthorized"),
            (
                b"GET /app.css HTTP/1.1\r\nHost: d\r\nAuthorization: Basic YWRtaW46eA==\r\n\r\n",
                "401 Unauthorized",
            ),
            (
                b"GET /app.css HTTP/1.1\r\nHost: d\r\nAuthorization: Basic YWRtaW46c2VjcmV0\r\n\r\n",
                "200 OK",
            ),
            (b"GET / HTTP/1.1\r\nHost: d\r\n\r\n", "200 OK"),
        ];

        for (request, status) in cases {
            let mut conn = MockConnection::from_chunks(&[request]);
            let (result, written) = exchange(&site, &mut conn).await;
            assert_eq!(result, Ok(()));
            assert!(
                written.starts_with(&std::format!("HTTP/1.1 {}\r\n", status)),
                "{}",
                written
            );
            assert_eq!(
                written.contains("WWW-Authenticate: Basic realm=\"device\"\r\n"),
                status.starts_with("401"),
            );
        }
    }

    #[tokio::test]
    async fn test_percent_encoded_path() {
        let written = get(&[b"GET /my%20page.html HTTP/1.1\r\nHost: device\r\n\r\n"]).await;
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.ends_with("\r\n\r\nspaced"));
    }

    #[tokio::test]
    async fn test_idle_session_times_out() {
        let mut conn = MockConnection::new(vec![]).idle_forever();
        let config = Config::default().with_request_timeout(Duration::from_millis(1000));
        let (result, written) = exchange(&server(config, 100), &mut conn).await;

        assert_eq!(result, Ok(()));
        assert!(written.is_empty());
        assert!(conn.shutdown);
    }

    #[tokio::test]
    async fn test_keep_alive_timeout_after_first_request() {
        let mut conn = MockConnection::new(vec![
            Step::Data(b"GET / HTTP/1.1\r\nHost: device\r\n\r\n".to_vec()),
            Step::Timeout,
        ])
        .idle_forever();
        let config = Config::default().with_keep_alive_timeout(Duration::from_millis(500));
        let (result, written) = exchange(&server(config, 100), &mut conn).await;

        assert_eq!(result, Ok(()));
        assert_eq!(written.matches("HTTP/1.1 200 OK\r\n").count(), 1);
    }

    #[tokio::test]
    async fn test_server_side_include_is_chunked() {
        let written = get(&[b"GET /status.shtml HTTP/1.1\r\nHost: device\r\n\r\n"]).await;
        assert!(written.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!written.contains("Content-Length"));
        assert!(written.ends_with("\r\n\r\n2\r\nT=\r\n2\r\n21\r\n1\r\nC\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_http10_unknown_length_closes() {
        let written = get(&[b"GET /status.shtml HTTP/1.0\r\nConnection: keep-alive\r\n\r\n"]).await;
        assert!(written.contains("Connection: close\r\n"));
        assert!(!written.contains("chunked"));
        assert!(written.ends_with("\r\n\r\nT=21C"));
    }

    #[tokio::test]
    async fn test_cgi_post_with_split_body() {
        let written = get(&[
            b"POST /echo.cgi HTTP/1.1\r\nHost: device\r\nContent-Length: 5\r\n\r\nhel",
            b"lo",
        ])
        .await;
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.contains("Content-Type: text/plain\r\n"));
        assert!(written.contains("Content-Length: 5\r\n"));
        assert!(written.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn test_request_errors() {
        let cases: [(&[u8], &str); 6] = [
            (b"POST /echo.cgi HTTP/1.1\r\nHost: d\r\n\r\n", "411 Length Required"),
            (b"POST /echo.cgi HTTP/1.1\r\nHost: d\r\nContent-Length: 5000\r\n\r\n", "413 Payload Too Large"),
            (b"PUT /index.html HTTP/1.1\r\nHost: d\r\n\r\n", "405 Method Not Allowed"),
            (b"GET / HTTP/1.1\r\n\r\n", "400 Bad Request"),
            (b"BREW / HTTP/1.1\r\nHost: d\r\n\r\n", "501 Not Implemented"),
            (b"GET / HTTP/2.0\r\nHost: d\r\n\r\n", "505 HTTP Version Not Supported"),
        ];
        for (request, status) in cases {
            let written = get(&[request]).await;
            assert!(
                written.starts_with(&std::format!("HTTP/1.1 {}\r\n", status)),
                "{}",
                written
            );
        }
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let written = get(&[b"HEAD / HTTP/1.1\r\nHost: device\r\n\r\n"]).await;
        assert!(written.contains("Content-Length: 11\r\n"));
        assert!(written.ends_with("\r\n\r\n"));
    }

    const UPGRADE: &str = "GET /ws HTTP/1.1\r\nHost: device\r\nUpgrade: websocket\r\n\
        Connection: keep-alive, Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n";

    #[tokio::test]
    async fn test_websocket_upgrade() {
        let request = std::format!("{}Sec-WebSocket-Version: 13\r\n\r\n", UPGRADE);
        let written = get(&[request.as_bytes()]).await;
        assert_eq!(
            written,
            "HTTP/1.1 101 Switching Protocols\r
Connection: Upgrade\r
Upgrade: WebSocket\r
Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r
\r
"
        );
    }

    #[tokio::test]
    async fn test_websocket_older_version_is_told_server_version() {
        let request = std::format!("{}Sec-WebSocket-Version: 8\r\n\r\n", UPGRADE);
        let written = get(&[request.as_bytes()]).await;
        assert!(written.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(written.contains("Sec-WebSocket-Version: 13\r\n"));
    }

    #[tokio::test]
    async fn test_websocket_version_too_high() {
        let request = std::format!("{}Sec-WebSocket-Version: 14\r\n\r\n", UPGRADE);
        let written = get(&[request.as_bytes()]).await;
        assert!(written.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
        assert!(written.contains("Sec-WebSocket-Version: 13\r\n"));
    }

    #[tokio::test]
    async fn test_websocket_bad_key() {
        let request = "GET /ws HTTP/1.1\r\nHost: device\r\nUpgrade: websocket\r\n\
            Connection: Upgrade\r\nSec-WebSocket-Key: c2hvcnQ=\r\nSec-WebSocket-Version: 13\r\n\r\n";
        let written = get(&[request.as_bytes()]).await;
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }
}
