//! Application hooks.  Every method has a default, so a handler only implements what it serves:
//!
//! ```
//! use embassy_sync::blocking_mutex::raw::RawMutex;
//! use wsgate::handler::Handler;
//! use wsgate::websocket::{CommandQueue, Message};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn websocket_accepts(&self, path: &str) -> bool {
//!         path == "/echo"
//!     }
//!
//!     fn on_message<M: RawMutex, const N: usize, const P: usize>(
//!         &self,
//!         message: Message<'_>,
//!         queue: &CommandQueue<M, N, P>,
//!     ) {
//!         let _ = queue.try_send_binary(message.data);
//!     }
//! }
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::request::Request;
use crate::response::StatusCode;
use crate::websocket::{CommandQueue, Message, WsErrorKind};

/// The result of a CGI call; the body is the first `len` bytes of the output buffer.
#[derive(Debug, PartialEq)]
pub struct CgiResponse {
    #[allow(missing_docs)]
    pub status: StatusCode,
    #[allow(missing_docs)]
    pub content_type: &'static str,
    #[allow(missing_docs)]
    pub len: usize,
}

/// Hooks invoked by a session.  They run on the session's task and must not block.
#[allow(unused_variables)]
pub trait Handler {
    /// Produce the response for a path ending with the configured CGI suffix.  `body` holds the
    /// request body; the response body is written to `out`.  Any method is accepted.
    fn cgi(&self, request: &Request, body: &[u8], out: &mut [u8]) -> Result<CgiResponse, StatusCode> {
        Err(StatusCode::NotFound)
    }

    /// Expand the server side include tag `name`, writing the replacement to `out` and returning
    /// its length.  Unknown tags expand to nothing.
    fn ssi(&self, name: &str, out: &mut [u8]) -> usize {
        0
    }

    /// Whether a websocket upgrade for `path` is accepted.
    fn websocket_accepts(&self, path: &str) -> bool {
        false
    }

    /// Subprotocol confirmed when the client offers it.
    fn websocket_protocol(&self, path: &str) -> Option<&'static str> {
        None
    }

    /// The upgrade for `path` completed.
    fn on_open(&self, path: &str) {}

    /// A piece of a data message arrived.  Replies go through `queue`.
    fn on_message<M: RawMutex, const N: usize, const P: usize>(
        &self,
        message: Message<'_>,
        queue: &CommandQueue<M, N, P>,
    ) {
    }

    /// The session closed, with the peer's close code if one was received.
    fn on_close(&self, code: Option<u16>) {}

    /// The session failed.  Called at most once, instead of `on_close`.
    fn on_error(&self, kind: WsErrorKind) {}
}
