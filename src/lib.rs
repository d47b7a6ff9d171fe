//! # Wsgate
//!
//! `wsgate` is an embedded HTTP/1.1 server whose connections can be upgraded to RFC 6455
//! WebSockets.  It is aimed at `no_std` and `no_alloc` targets: every session works inside one
//! caller supplied buffer and nothing on the data path allocates.
//!
//! This crate provides:
//!
//! * a per-connection HTTP state machine that reads requests across arbitrarily fragmented
//!   reads, serves files from a `fs::FileSystem` (with server side includes), calls CGI hooks
//!   and answers errors with generated pages.
//! * keep-alive with idle timeouts, limited by a fixed number of session slots.
//! * the WebSocket handshake and a frame engine: fragmented messages, incremental UTF-8
//!   validation, ping/pong keepalive, and a `websocket::CommandQueue` through which other tasks
//!   send messages or close the connection.
//!
//! This crate does **not** provide:
//!
//! * TLS, sockets or an executor; bring anything implementing `embedded_io_async::{Read, Write}`.
//! * routing beyond the `handler::Handler` hooks.
//!
//! ## Basic Use
//!
//! Create a `server::Server` with a `handler::Handler`, a `fs::FileSystem`, a `clock::Clock`
//! and a `config::Config`.  Each worker task reserves a session slot, accepts a connection and
//! calls `serve()` with it, a buffer for the session and the worker's command queue.  Reads on
//! the connection should time out (with `ErrorKind::TimedOut`) after a short interval so the
//! session can check its timers and command queue.
//!
//! ## Example
//!
//! ```
//! # use tokio;
//! # use embedded_io_async::{Read, Write};
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//!
//! use wsgate::clock::Clock;
//! use wsgate::config::Config;
//! use wsgate::fs::StaticFs;
//! use wsgate::handler::Handler;
//! use wsgate::server::Server;
//! use wsgate::websocket::CommandQueue;
//!
//! static FILES: &[(&str, &[u8])] = &[("/index.html", b"<html>...</html>")];
//!
//! struct MyHandler;
//!
//! impl Handler for MyHandler {
//!     fn websocket_accepts(&self, path: &str) -> bool {
//!         path == "/ws"
//!     }
//! }
//!
//! struct Uptime;
//!
//! impl Clock for Uptime {
//!     fn now_ms(&self) -> u64 {
//!         // e.g. embassy_time::Instant::now().as_millis()
//!         0
//!     }
//! }
//!
//! # struct Client<'a> {
//! #     reader: &'a [u8],
//! #     writer: &'a mut [u8],
//! # }
//! #
//! # impl<'a> embedded_io_async::ErrorType for Client<'a> {
//! #     type Error = embedded_io_async::ErrorKind;
//! # }
//! #
//! # impl<'a> embedded_io_async::Read for Client<'a> {
//! #     async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
//! #         match self.reader.read(buf).await {
//! #             Ok(n) => Ok(n),
//! #             Err(_) => Err(embedded_io_async::ErrorKind::Other),
//! #         }
//! #     }
//! # }
//! #
//! # impl<'a> embedded_io_async::Write for Client<'a> {
//! #     async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
//! #         match self.writer.write(buf).await {
//! #             Ok(n) => Ok(n),
//! #             Err(_) => Err(embedded_io_async::ErrorKind::Other),
//! #         }
//! #     }
//! # }
//! #
//! # impl<'a> wsgate::Connection for Client<'a> {}
//! #
//! async fn run_server() {
//!     let mut write_buf = [0u8; 4096];
//!
//!     // Client implements wsgate::Connection (not shown)
//!     // this would typically wrap a TCP socket, e.g. embassy_net::tcp::TcpSocket
//!     let mut client = Client {
//!         reader: b"GET / HTTP/1.1\r\nHost: device\r\n\r\n",
//!         writer: write_buf.as_mut_slice(),
//!     };
//!
//!     let server: Server<NoopRawMutex, _, _, _> =
//!         Server::new(MyHandler, StaticFs::new(FILES), Uptime, Config::default());
//!     let queue: CommandQueue<NoopRawMutex, 4, 128> = CommandQueue::new();
//!
//!     let mut session_buffer = [0u8; 2048];
//!     let slot = server.reserve().await;
//!     if server
//!         .serve(slot, &mut client, &mut session_buffer[..], &queue)
//!         .await
//!         .is_err()
//!     {
//!         // handle error
//!     }
//! }
//! #
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! #     run_server().await;
//! # })
//! ```
//!
//! ## Features
//!
//! * `defmt`: log through `defmt` and derive `defmt::Format` for the public types.
//! * `embassy-time`: `clock::EmbassyClock` and `CommandQueue::post_timeout`.

#![no_std]
#![warn(missing_docs)]

mod fmt;

mod arena;
mod ascii;
/// Time source
pub mod clock;
/// Server configuration
pub mod config;
/// Static content
pub mod fs;
/// Application hooks
pub mod handler;
/// HTTP Headers
pub mod header;
/// Content types
pub mod mime;
/// HTTP Requests
pub mod request;
/// HTTP responses
pub mod response;
/// HTTP server
pub mod server;
mod session;
mod ssi;
mod uri;
/// Websockets
pub mod websocket;

#[cfg(test)]
mod testutil;

pub use arena::{MIN_RX_LEN, MIN_TX_LEN};

use embedded_io_async::{Read, Write};

/// A client connection.  Reads should fail with `ErrorKind::TimedOut` when no data arrives for a
/// while (tens to hundreds of milliseconds) so that timers and queued commands are serviced;
/// `Ok(0)` means the peer closed the connection.
pub trait Connection: Read + Write {
    /// Close the transport.  The default does nothing, for transports that close on drop.
    fn shutdown(&mut self) -> impl Future<Output = ()> {
        async {}
    }
}

pub(crate) enum WriteError {
    NetworkError,
}

pub(crate) trait HttpWrite {
    async fn write<T: Write>(self, writer: &mut T) -> Result<(), WriteError>;
}
