//! The per-session buffer arena.  The caller supplies one byte slice per session which is split
//! once into non-overlapping regions:
//!
//! ```text
//! | receive .................................................. | transmit ........ |
//! | ws header (14) | ws control (125) | ws payload ............ |                   |
//! ```
//!
//! While the session speaks HTTP the whole receive region accumulates request bytes and the
//! transmit region stages the response.  After an upgrade the receive region is split again into
//! the three websocket sub-regions.  Nothing on the data path allocates.

use embedded_io_async::{ErrorType, Write};

use crate::WriteError;

/// Longest websocket frame header: 2 + 8 byte length + 4 byte mask key.
pub const WS_HEADER_LEN: usize = 14;
/// Largest control frame payload allowed on the wire.
pub const WS_CONTROL_LEN: usize = 125;
/// Smallest receive region accepted.
pub const MIN_RX_LEN: usize = 256;
/// Smallest transmit region accepted; must hold a full control frame.
pub const MIN_TX_LEN: usize = 128;

/// The session buffer split into its receive and transmit regions.
pub(crate) struct Arena<'a> {
    pub(crate) rx: Buffer<'a>,
    pub(crate) tx: Buffer<'a>,
}

impl<'a> Arena<'a> {
    /// Split `buf` keeping the last `tx_len` bytes for the transmit region.  Callers validate the
    /// sizes with `Config::validate_buffer` first.
    pub(crate) fn new(buf: &'a mut [u8], tx_len: usize) -> Self {
        let split = buf.len().saturating_sub(tx_len);
        let (rx, tx) = buf.split_at_mut(split);
        Self {
            rx: Buffer::new(rx),
            tx: Buffer::new(tx),
        }
    }
}

/// Receive sub-regions used by an upgraded session.
pub(crate) struct WsRegions<'a> {
    pub(crate) header: &'a mut [u8],
    pub(crate) control: &'a mut [u8],
    pub(crate) payload: &'a mut [u8],
}

impl<'a> WsRegions<'a> {
    pub(crate) fn split(rx: &'a mut [u8]) -> Self {
        let (header, rest) = rx.split_at_mut(WS_HEADER_LEN);
        let (control, payload) = rest.split_at_mut(WS_CONTROL_LEN);
        Self {
            header,
            control,
            payload,
        }
    }
}

/// A fixed capacity byte buffer with a write cursor.  Used both to accumulate inbound bytes and
/// to stage outbound bytes.
pub(crate) struct Buffer<'a> {
    data: &'a mut [u8],
    offset: usize,
}

impl<'a> Buffer<'a> {
    pub(crate) fn new(data: &'a mut [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.offset
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.offset == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.offset == self.data.len()
    }

    /// Bytes written so far.
    pub(crate) fn filled(&self) -> &[u8] {
        &self.data[..self.offset]
    }

    pub(crate) fn spare(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    /// The unwritten tail, to be passed to a read.
    pub(crate) fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.offset..]
    }

    /// Filled bytes and the unwritten tail at once.
    pub(crate) fn split_mut(&mut self) -> (&mut [u8], &mut [u8]) {
        self.data.split_at_mut(self.offset)
    }

    /// Mark `n` bytes of the spare region as written.
    pub(crate) fn advance(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.data.len());
    }

    /// Copy as much of `src` as fits, returning the number of bytes taken.
    pub(crate) fn push(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.data.len() - self.offset);
        self.data[self.offset..self.offset + n].copy_from_slice(&src[..n]);
        self.offset += n;
        n
    }

    /// Drop the first `n` filled bytes, moving the remainder to the front.
    pub(crate) fn consume(&mut self, n: usize) {
        let n = n.min(self.offset);
        self.data.copy_within(n..self.offset, 0);
        self.offset -= n;
    }

    pub(crate) fn clear(&mut self) {
        self.offset = 0;
    }

    pub(crate) fn into_inner(self) -> &'a mut [u8] {
        self.data
    }

    /// Write all filled bytes to `writer` and reset the cursor.
    pub(crate) async fn flush_to<W: Write>(&mut self, writer: &mut W) -> Result<(), WriteError> {
        if self.offset > 0 {
            writer
                .write_all(&self.data[..self.offset])
                .await
                .or(Err(WriteError::NetworkError))?;
            self.offset = 0;
        }
        Ok(())
    }
}

/// Stages writes in a `Buffer` and forwards them to the client whenever the buffer fills.
pub(crate) struct BufferedWriter<'b, 'a, C> {
    buf: &'b mut Buffer<'a>,
    client: &'b mut C,
}

impl<'b, 'a, C: Write> BufferedWriter<'b, 'a, C> {
    pub(crate) fn new(buf: &'b mut Buffer<'a>, client: &'b mut C) -> Self {
        Self { buf, client }
    }
}

impl<C: Write> ErrorType for BufferedWriter<'_, '_, C> {
    type Error = C::Error;
}

impl<C: Write> Write for BufferedWriter<'_, '_, C> {
    async fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        if data.is_empty() {
            return Ok(0);
        }
        if self.buf.is_full() {
            self.flush_buffer().await?;
        }
        Ok(self.buf.push(data))
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.flush_buffer().await?;
        self.client.flush().await
    }
}

impl<C: Write> BufferedWriter<'_, '_, C> {
    async fn flush_buffer(&mut self) -> Result<(), C::Error> {
        if !self.buf.is_empty() {
            self.client.write_all(self.buf.filled()).await?;
            self.buf.clear();
        }
        Ok(())
    }
}
