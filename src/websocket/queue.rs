//! Commands posted to a WebSocket session from other tasks.
//!
//! The queue is the only way for application code to reach a connection: the session task drains
//! it between receives, so sends never interleave with frames it is writing itself.  It is
//! typically placed in a `static`, one per worker:
//!
//! ```
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use wsgate::websocket::CommandQueue;
//!
//! let queue: CommandQueue<NoopRawMutex, 4, 64> = CommandQueue::new();
//! queue.try_send_text("hello").unwrap();
//! assert_eq!(queue.len(), 1);
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use heapless::Vec;

use super::Opcode;

/// A request to a session.  `P` bounds the payload carried by one command.
#[derive(Debug, PartialEq)]
pub enum Command<const P: usize> {
    /// Send a message; split into continuation frames when larger than the transmit region
    Send {
        /// `Text` or `Binary`
        opcode: Opcode,
        /// Message payload
        data: Vec<u8, P>,
    },
    /// Start the closing handshake with status 1001
    Close,
}

/// Why a command could not be queued
#[derive(Debug, PartialEq)]
pub enum QueueError<const P: usize> {
    /// The queue is full; the command is handed back
    Full(Command<P>),
    /// The payload does not fit in a command
    TooLarge,
    /// A posting deadline passed
    Timeout,
}

/// A bounded multi producer queue of `N` commands feeding one session.
pub struct CommandQueue<M: RawMutex, const N: usize, const P: usize> {
    channel: Channel<M, Command<P>, N>,
}

impl<M: RawMutex, const N: usize, const P: usize> Default for CommandQueue<M, N, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const N: usize, const P: usize> CommandQueue<M, N, P> {
    #[allow(missing_docs)]
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue `command` without waiting.
    pub fn try_post(&self, command: Command<P>) -> Result<(), QueueError<P>> {
        self.channel.try_send(command).map_err(|e| match e {
            TrySendError::Full(command) => QueueError::Full(command),
        })
    }

    /// Queue `command`, waiting for space.
    pub async fn post(&self, command: Command<P>) {
        self.channel.send(command).await
    }

    /// Queue `command`, waiting at most `timeout` for space.
    #[cfg(feature = "embassy-time")]
    pub async fn post_timeout(
        &self,
        command: Command<P>,
        timeout: embassy_time::Duration,
    ) -> Result<(), QueueError<P>> {
        embassy_time::with_timeout(timeout, self.channel.send(command))
            .await
            .map_err(|_| QueueError::Timeout)
    }

    /// Queue a text message.
    pub fn try_send_text(&self, text: &str) -> Result<(), QueueError<P>> {
        self.try_send(Opcode::Text, text.as_bytes())
    }

    /// Queue a binary message.
    pub fn try_send_binary(&self, data: &[u8]) -> Result<(), QueueError<P>> {
        self.try_send(Opcode::Binary, data)
    }

    /// Ask the session to close.
    pub fn try_close(&self) -> Result<(), QueueError<P>> {
        self.try_post(Command::Close)
    }

    /// Number of commands waiting.
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    /// No commands waiting.
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    fn try_send(&self, opcode: Opcode, payload: &[u8]) -> Result<(), QueueError<P>> {
        let data = Vec::from_slice(payload).or(Err(QueueError::TooLarge))?;
        self.try_post(Command::Send { opcode, data })
    }

    pub(crate) fn try_fetch(&self) -> Option<Command<P>> {
        self.channel.try_receive().ok()
    }

    /// Drop commands left over from a previous session.
    pub(crate) fn discard(&self) {
        while self.channel.try_receive().is_ok() {}
    }
}
