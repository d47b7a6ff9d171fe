use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::semaphore::{GreedySemaphore, Semaphore, SemaphoreReleaser};

use crate::arena::Arena;
use crate::clock::Clock;
use crate::config::Config;
use crate::fs::FileSystem;
use crate::handler::Handler;
use crate::session::{Session, SessionEnd};
use crate::websocket::{CommandQueue, WebSocket, WsErrorKind};
use crate::{Connection, WriteError};

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// ServerError is returned by `Server::serve()` when a session ends abnormally.  Either way the
/// connection has been shut down.
pub enum ServerError {
    /// The session buffer cannot hold the configured receive and transmit regions
    BufferTooSmall,
    /// Read or write failure on the client connection
    NetworkError,
    /// The upgraded websocket session failed
    WebsocketError(WsErrorKind),
}

impl From<WriteError> for ServerError {
    fn from(value: WriteError) -> Self {
        match value {
            WriteError::NetworkError => Self::NetworkError,
        }
    }
}

/// Permission to serve one session.  The slot is returned when dropped.
pub struct SessionSlot<'a, M: RawMutex> {
    _permit: SemaphoreReleaser<'a, GreedySemaphore<M>>,
}

/// Marks a session as being served until dropped.
pub(crate) struct ActiveSession<'a, M: RawMutex> {
    active: &'a Mutex<M, Cell<usize>>,
}

impl<M: RawMutex> Drop for ActiveSession<'_, M> {
    fn drop(&mut self) {
        self.active.lock(|n| n.set(n.get().saturating_sub(1)));
    }
}

/// Server is the main struct to be used by users of the crate.  It owns the application
/// `Handler`, the `FileSystem` static content is served from, the `Clock` timeouts are measured
/// with and the session slots.  Each worker task reserves a slot, accepts a connection and
/// calls `serve()` with it.
pub struct Server<M: RawMutex, H, F, K> {
    pub(crate) handler: H,
    pub(crate) fs: F,
    pub(crate) clock: K,
    pub(crate) config: Config,
    slots: GreedySemaphore<M>,
    /// sessions inside `serve`; idle workers holding a slot are not counted
    active: Mutex<M, Cell<usize>>,
}

impl<M, H, F, K> Server<M, H, F, K>
where
    M: RawMutex,
    H: Handler,
    F: FileSystem,
    K: Clock,
{
    /// Construct a Server with `config.max_sessions` session slots
    pub fn new(handler: H, fs: F, clock: K, config: Config) -> Self {
        Self {
            handler,
            fs,
            clock,
            slots: GreedySemaphore::new(config.max_sessions),
            active: Mutex::new(Cell::new(0)),
            config,
        }
    }

    #[allow(missing_docs)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[allow(missing_docs)]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Wait for a free session slot.  Reserve before accepting so a connection is only taken
    /// when it can be served.
    pub async fn reserve(&self) -> SessionSlot<'_, M> {
        match self.slots.acquire(1).await {
            Ok(permit) => SessionSlot { _permit: permit },
            Err(never) => match never {},
        }
    }

    /// Take a free session slot, if there is one.
    pub fn try_reserve(&self) -> Option<SessionSlot<'_, M>> {
        self.slots
            .try_acquire(1)
            .map(|permit| SessionSlot { _permit: permit })
    }

    /// Whether every slot is busy serving a connection, i.e. the calling session is the last
    /// one allowed.
    pub(crate) fn last_slot(&self) -> bool {
        self.active.lock(|n| n.get()) >= self.config.max_sessions
    }

    pub(crate) fn begin_session(&self) -> ActiveSession<'_, M> {
        self.active.lock(|n| n.set(n.get() + 1));
        ActiveSession {
            active: &self.active,
        }
    }

    /// Serve `client` until the connection closes, using `buffer` for every byte received or
    /// sent.  If the session upgrades to a websocket, `queue` carries commands from other tasks
    /// to it; commands left in the queue by an earlier session are discarded.
    ///
    /// The client is shut down and `slot` released before this returns.  `Ok(())` is returned
    /// for orderly ends, including timeouts and peer disconnects.
    pub async fn serve<C, const N: usize, const P: usize>(
        &self,
        slot: SessionSlot<'_, M>,
        client: &mut C,
        buffer: &mut [u8],
        queue: &CommandQueue<M, N, P>,
    ) -> Result<(), ServerError>
    where
        C: Connection,
    {
        let active = self.begin_session();
        let result = self.run_session(client, buffer, queue).await;
        drop(active);
        if let Err(_e) = &result {
            warn!("session ended with error: {}", _e);
        }

        client.shutdown().await;
        drop(slot);
        result
    }

    async fn run_session<C, const N: usize, const P: usize>(
        &self,
        client: &mut C,
        buffer: &mut [u8],
        queue: &CommandQueue<M, N, P>,
    ) -> Result<(), ServerError>
    where
        C: Connection,
    {
        self.config.validate_buffer(buffer.len())?;
        let arena = Arena::new(buffer, self.config.tx_buffer_len);

        match Session::new(self, client, arena).run().await? {
            SessionEnd::Closed => Ok(()),
            SessionEnd::Upgraded { conn, rx, tx, path } => {
                queue.discard();
                self.handler.on_open(&path);

                WebSocket::new(
                    conn,
                    rx,
                    tx,
                    queue,
                    &self.handler,
                    &self.clock,
                    &self.config.websocket,
                )
                .run()
                .await
                .map_err(ServerError::WebsocketError)
            }
        }
    }
}
