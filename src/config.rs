//! Server configuration.  All values have embedded friendly defaults and can be adjusted with
//! the `with_*` builder methods.
//!
//! ```
//! use core::time::Duration;
//! use wsgate::config::{Config, WsConfig};
//!
//! let config = Config::default()
//!     .with_max_sessions(2)
//!     .with_keep_alive_timeout(Duration::from_secs(2))
//!     .with_websocket(WsConfig::default().with_keepalive_interval(Duration::from_secs(10)));
//!
//! assert_eq!(config.max_sessions, 2);
//! ```

use core::time::Duration;

use crate::arena::{MIN_RX_LEN, MIN_TX_LEN};
use crate::server::ServerError;

/// Highest `Sec-WebSocket-Version` understood by the server.
pub const WEBSOCKET_VERSION: u8 = 13;

/// HTTP session configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of concurrently served sessions.
    pub max_sessions: usize,
    /// Allow more than one request per connection.
    pub keep_alive: bool,
    /// Idle time allowed before the first request of a session completes.
    pub request_timeout: Duration,
    /// Idle time allowed between requests on a kept-alive connection.
    pub keep_alive_timeout: Duration,
    /// Bytes of the session buffer reserved for outbound staging.
    pub tx_buffer_len: usize,
    /// File substituted when a path names a directory.
    pub index_page: &'static str,
    /// Paths ending with this suffix are served by `Handler::cgi`.
    pub cgi_suffix: Option<&'static str>,
    /// Value of the `Server` response header, omitted when `None`.
    pub server_name: Option<&'static str>,
    /// Paths guarded by HTTP Basic authentication; the first realm covering a path applies.
    pub auth_realms: &'static [AuthRealm],
    /// Websocket settings
    pub websocket: WsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_sessions: 4,
            keep_alive: true,
            request_timeout: Duration::from_secs(10),
            keep_alive_timeout: Duration::from_secs(5),
            tx_buffer_len: 512,
            index_page: "index.html",
            cgi_suffix: Some(".cgi"),
            server_name: None,
            auth_realms: &[],
            websocket: WsConfig::default(),
        }
    }
}

impl Config {
    #[allow(missing_docs)]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    #[allow(missing_docs)]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    #[allow(missing_docs)]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[allow(missing_docs)]
    pub fn with_keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    #[allow(missing_docs)]
    pub fn with_tx_buffer_len(mut self, len: usize) -> Self {
        self.tx_buffer_len = len;
        self
    }

    #[allow(missing_docs)]
    pub fn with_index_page(mut self, index_page: &'static str) -> Self {
        self.index_page = index_page;
        self
    }

    #[allow(missing_docs)]
    pub fn with_cgi_suffix(mut self, suffix: Option<&'static str>) -> Self {
        self.cgi_suffix = suffix;
        self
    }

    #[allow(missing_docs)]
    pub fn with_server_name(mut self, name: &'static str) -> Self {
        self.server_name = Some(name);
        self
    }

    #[allow(missing_docs)]
    pub fn with_auth_realms(mut self, realms: &'static [AuthRealm]) -> Self {
        self.auth_realms = realms;
        self
    }

    #[allow(missing_docs)]
    pub fn with_websocket(mut self, websocket: WsConfig) -> Self {
        self.websocket = websocket;
        self
    }

    /// Checks that a session buffer of `len` bytes can be split into the receive and transmit
    /// regions this configuration needs.
    pub fn validate_buffer(&self, len: usize) -> Result<(), ServerError> {
        if self.tx_buffer_len < MIN_TX_LEN || len < self.tx_buffer_len + MIN_RX_LEN {
            return Err(ServerError::BufferTooSmall);
        }
        Ok(())
    }
}

/// A set of users allowed below a path prefix.  Requests without matching `Authorization: Basic`
/// credentials are answered with `401 Unauthorized` naming the realm.
#[derive(Clone, Copy, Debug)]
pub struct AuthRealm {
    /// Path prefix the realm guards, e.g. `/admin/`
    pub path: &'static str,
    /// Realm name shown to the client
    pub name: &'static str,
    /// Accepted `(user, password)` pairs
    pub users: &'static [(&'static str, &'static str)],
}

impl AuthRealm {
    /// Whether requests for `path` need this realm's credentials.
    pub fn covers(&self, path: &str) -> bool {
        path.starts_with(self.path)
    }

    #[allow(missing_docs)]
    pub fn accepts(&self, user: &str, password: &str) -> bool {
        self.users.iter().any(|(u, p)| *u == user && *p == password)
    }
}

/// Websocket configuration
#[derive(Clone, Debug)]
pub struct WsConfig {
    /// Highest accepted `Sec-WebSocket-Version`; higher requests receive `426 Upgrade Required`.
    pub max_version: u8,
    /// Receive silence after which a PING is sent.  A second silent interval fails the session.
    /// Zero disables the keepalive.
    pub keepalive_interval: Duration,
    /// How long to wait for the peer's CLOSE after sending ours.
    pub close_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_version: WEBSOCKET_VERSION,
            keepalive_interval: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
        }
    }
}

impl WsConfig {
    #[allow(missing_docs)]
    pub fn with_max_version(mut self, version: u8) -> Self {
        self.max_version = version;
        self
    }

    #[allow(missing_docs)]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    #[allow(missing_docs)]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
