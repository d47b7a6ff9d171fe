//! A websocket is an HTTP connection that is "upgraded" to carry WebSocket frames instead.  Once
//! upgraded it cannot be downgraded.
//!
//! For more info:
//!
//! * <https://developer.mozilla.org/en-US/docs/Web/API/WebSockets_API/Writing_WebSocket_servers>
//! * <https://www.rfc-editor.org/rfc/rfc6455>
//!
//! After the `101 Switching Protocols` response the session's receive region is split into a
//! header area, a control frame area and a payload area, and a frame engine takes over the
//! connection.  The engine:
//!
//! * unmasks and delivers data frames to `Handler::on_message` in pieces as they arrive, so a
//!   message may be far larger than the payload area,
//! * answers PINGs, tracks PONGs and checks idle peers with a single PING per keepalive interval,
//! * validates text messages as UTF-8 across piece boundaries,
//! * executes commands other tasks post on the session's `CommandQueue`.
//!
//! Protocol violations close the connection with the matching status code (1002, 1007 or 1009)
//! and are reported once through `Handler::on_error`.

mod close;
mod engine;
mod frame;
mod handshake;
mod mask;
mod queue;
mod utf8;

pub use close::{CloseCode, is_valid_close_code};
pub(crate) use engine::WebSocket;
pub use frame::{FrameError, FrameHeader, Opcode};
pub use handshake::{ACCEPT_LEN, KEY_LEN, accept_token, key_is_valid, select_protocol};
pub use queue::{Command, CommandQueue, QueueError};

/// Terminal websocket session failures, as reported to `Handler::on_error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WsErrorKind {
    /// The peer broke the framing rules; closed with 1002
    ProtocolError,
    /// A text message was not valid UTF-8; closed with 1007
    InvalidPayload,
    /// A frame length exceeded 32 bits; closed with 1009
    MessageTooBig,
    /// No PONG arrived within a keepalive interval after a PING
    PongTimeout,
    /// Read or write failure on the underlying connection
    NetworkError,
}

/// Type of a data message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    #[allow(missing_docs)]
    Text,
    #[allow(missing_docs)]
    Binary,
}

/// A piece of a received data message.  Pieces of one message arrive in order; `first` marks the
/// first and `fin` the last.  A message that fits the payload area arrives as a single piece with
/// both set.
#[derive(Debug)]
pub struct Message<'a> {
    /// Text or binary
    pub kind: MessageKind,
    /// Unmasked payload bytes.  For text, a code point may be split between two pieces.
    pub data: &'a [u8],
    /// First piece of the message
    pub first: bool,
    /// Last piece of the message
    pub fin: bool,
}
