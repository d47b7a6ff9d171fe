use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_io_async::{Error, ErrorKind, Read, Write};

use super::close::parse_close_payload;
use super::mask::apply_mask;
use super::utf8::Utf8Validator;
use super::{
    CloseCode, Command, CommandQueue, FrameError, FrameHeader, Message, MessageKind, Opcode,
    WsErrorKind,
};
use crate::Connection;
use crate::arena::{WS_CONTROL_LEN, WsRegions};
use crate::clock::Clock;
use crate::config::{WsConfig, millis};
use crate::handler::Handler;

/// Largest header of an unmasked server frame.
const SERVER_HEADER_LEN: usize = 10;
/// Bytes needed to start decoding a header.
const HEADER_START: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq)]
enum RxState {
    ExpectStart,
    ExpectContinuation,
}

/// Region the next read lands in.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Target {
    Header,
    Control,
    Payload,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Open,
    AwaitingPong,
    /// our CLOSE is sent, waiting for the peer's
    Closing,
    Closed,
}

struct Context {
    target: Target,
    header_len: usize,
    header_need: usize,
    frame: FrameHeader,
    /// payload bytes of the current frame not yet received
    remaining: usize,
    mask_pos: usize,
    control_len: usize,
    /// payload bytes waiting for delivery
    fill: usize,
    rx_state: RxState,
    kind: MessageKind,
    first: bool,
    utf8: Utf8Validator,
    phase: Phase,
    last_rx: u64,
}

/// The frame engine of an upgraded session.
pub(crate) struct WebSocket<'a, C, H, K, M: RawMutex, const N: usize, const P: usize> {
    conn: &'a mut C,
    rx: WsRegions<'a>,
    tx: &'a mut [u8],
    queue: &'a CommandQueue<M, N, P>,
    handler: &'a H,
    clock: &'a K,
    keepalive_ms: u64,
    close_ms: u64,
    ctx: Context,
}

impl<'a, C, H, K, M, const N: usize, const P: usize> WebSocket<'a, C, H, K, M, N, P>
where
    C: Connection,
    H: Handler,
    K: Clock,
    M: RawMutex,
{
    pub(crate) fn new(
        conn: &'a mut C,
        rx: &'a mut [u8],
        tx: &'a mut [u8],
        queue: &'a CommandQueue<M, N, P>,
        handler: &'a H,
        clock: &'a K,
        config: &WsConfig,
    ) -> Self {
        Self {
            conn,
            rx: WsRegions::split(rx),
            tx,
            queue,
            handler,
            clock,
            keepalive_ms: millis(config.keepalive_interval),
            close_ms: millis(config.close_timeout),
            ctx: Context {
                target: Target::Header,
                header_len: 0,
                header_need: HEADER_START,
                frame: FrameHeader::new(Opcode::Continuation, true, 0),
                remaining: 0,
                mask_pos: 0,
                control_len: 0,
                fill: 0,
                rx_state: RxState::ExpectStart,
                kind: MessageKind::Binary,
                first: true,
                utf8: Utf8Validator::default(),
                phase: Phase::Open,
                last_rx: clock.now_ms(),
            },
        }
    }

    /// Serve the connection until it closes.  A failure is reported to the handler once before
    /// it is returned.
    pub(crate) async fn run(mut self) -> Result<(), WsErrorKind> {
        let result = self.pump().await;
        if let Err(kind) = result {
            self.handler.on_error(kind);
        }
        result
    }

    async fn pump(&mut self) -> Result<(), WsErrorKind> {
        loop {
            self.check_timers().await?;

            while self.ctx.phase != Phase::Closed {
                match self.queue.try_fetch() {
                    Some(command) => self.execute(command).await?,
                    None => break,
                }
            }
            if self.ctx.phase == Phase::Closed {
                return Ok(());
            }

            self.receive().await?;
            if self.ctx.phase == Phase::Closed {
                return Ok(());
            }
        }
    }

    async fn check_timers(&mut self) -> Result<(), WsErrorKind> {
        let idle = self.clock.elapsed_ms(self.ctx.last_rx);

        // the close wait runs even with the keepalive disabled
        if self.ctx.phase == Phase::Closing {
            if idle >= self.close_ms {
                debug!("websocket close handshake timed out");
                self.ctx.phase = Phase::Closed;
                self.handler.on_close(None);
            }
            return Ok(());
        }

        if self.keepalive_ms == 0 || idle < self.keepalive_ms {
            return Ok(());
        }

        match self.ctx.phase {
            Phase::Open => {
                debug!("websocket idle, sending ping");
                Self::send_frame(&mut *self.conn, &mut *self.tx, Opcode::Ping, true, &[]).await?;
                self.ctx.phase = Phase::AwaitingPong;
                self.ctx.last_rx = self.clock.now_ms();
                Ok(())
            }
            Phase::AwaitingPong => {
                warn!("websocket peer did not answer ping");
                self.ctx.phase = Phase::Closed;
                Err(WsErrorKind::PongTimeout)
            }
            Phase::Closing | Phase::Closed => Ok(()),
        }
    }

    async fn execute(&mut self, command: Command<P>) -> Result<(), WsErrorKind> {
        if !matches!(self.ctx.phase, Phase::Open | Phase::AwaitingPong) {
            debug!("websocket closing, command dropped");
            return Ok(());
        }

        match command {
            Command::Send { opcode, data } => self.send_message(opcode, &data).await,
            Command::Close => {
                debug!("websocket close requested");
                let code = u16::from(CloseCode::GoingAway).to_be_bytes();
                Self::send_frame(&mut *self.conn, &mut *self.tx, Opcode::Close, true, &code).await?;
                self.ctx.phase = Phase::Closing;
                self.ctx.last_rx = self.clock.now_ms();
                Ok(())
            }
        }
    }

    /// Send `data` as one message, split into continuation frames when it does not fit the
    /// transmit region.
    async fn send_message(&mut self, opcode: Opcode, data: &[u8]) -> Result<(), WsErrorKind> {
        if opcode.is_control() {
            if data.len() > WS_CONTROL_LEN {
                warn!("control frame payload too long, dropped");
                return Ok(());
            }
            return Self::send_frame(&mut *self.conn, &mut *self.tx, opcode, true, data).await;
        }

        let room = self.tx.len() - SERVER_HEADER_LEN;
        let mut opcode = opcode;
        let mut rest = data;
        loop {
            let n = rest.len().min(room);
            let fin = n == rest.len();
            Self::send_frame(&mut *self.conn, &mut *self.tx, opcode, fin, &rest[..n]).await?;
            if fin {
                return Ok(());
            }
            rest = &rest[n..];
            opcode = Opcode::Continuation;
        }
    }

    async fn send_frame(
        conn: &mut C,
        tx: &mut [u8],
        opcode: Opcode,
        fin: bool,
        payload: &[u8],
    ) -> Result<(), WsErrorKind> {
        let header = FrameHeader::new(opcode, fin, payload.len() as u32);
        let n = header.encode(tx).or(Err(WsErrorKind::MessageTooBig))?;
        let end = n + payload.len();
        if end > tx.len() {
            return Err(WsErrorKind::MessageTooBig);
        }
        tx[n..end].copy_from_slice(payload);

        conn.write_all(&tx[..end]).await.or(Err(WsErrorKind::NetworkError))?;
        conn.flush().await.or(Err(WsErrorKind::NetworkError))
    }

    /// Close with `code` and fail the session.
    async fn fail(&mut self, code: CloseCode, kind: WsErrorKind) -> Result<(), WsErrorKind> {
        let code = u16::from(code);
        warn!("failing websocket with close code {}", code);
        let _ = Self::send_frame(&mut *self.conn, &mut *self.tx, Opcode::Close, true, &code.to_be_bytes()).await;
        self.ctx.phase = Phase::Closed;
        Err(kind)
    }

    async fn receive(&mut self) -> Result<(), WsErrorKind> {
        let ctx = &self.ctx;
        let buf = match ctx.target {
            Target::Header => &mut self.rx.header[ctx.header_len..ctx.header_need],
            Target::Control => &mut self.rx.control[ctx.control_len..ctx.frame.len as usize],
            Target::Payload => {
                let end = self.rx.payload.len().min(ctx.fill + ctx.remaining);
                &mut self.rx.payload[ctx.fill..end]
            }
        };

        let n = match self.conn.read(buf).await {
            Ok(0) => {
                debug!("websocket peer closed the connection");
                self.ctx.phase = Phase::Closed;
                self.handler.on_close(None);
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(()),
            Err(_) => return Err(WsErrorKind::NetworkError),
        };
        self.ctx.last_rx = self.clock.now_ms();

        match self.ctx.target {
            Target::Header => self.on_header_bytes(n).await,
            Target::Control => self.on_control_bytes(n).await,
            Target::Payload => self.on_payload_bytes(n).await,
        }
    }

    async fn on_header_bytes(&mut self, n: usize) -> Result<(), WsErrorKind> {
        self.ctx.header_len += n;
        match FrameHeader::decode(&self.rx.header[..self.ctx.header_len]) {
            Ok(frame) => self.start_frame(frame).await,
            Err(FrameError::InsufficientData(more)) => {
                self.ctx.header_need = self.ctx.header_len + more;
                Ok(())
            }
            Err(FrameError::TooLarge) => {
                self.fail(CloseCode::MessageTooBig, WsErrorKind::MessageTooBig)
                    .await
            }
            Err(_e) => {
                debug!("bad frame header: {}", _e);
                self.fail(CloseCode::ProtocolError, WsErrorKind::ProtocolError)
                    .await
            }
        }
    }

    async fn start_frame(&mut self, frame: FrameHeader) -> Result<(), WsErrorKind> {
        if frame.check_client().is_err() {
            debug!("client frame not masked");
            return self
                .fail(CloseCode::ProtocolError, WsErrorKind::ProtocolError)
                .await;
        }

        match (frame.opcode, self.ctx.rx_state) {
            (Opcode::Continuation, RxState::ExpectStart) => {
                debug!("continuation frame outside a message");
                return self
                    .fail(CloseCode::ProtocolError, WsErrorKind::ProtocolError)
                    .await;
            }
            (Opcode::Text | Opcode::Binary, RxState::ExpectContinuation) => {
                debug!("new message inside a fragmented message");
                return self
                    .fail(CloseCode::ProtocolError, WsErrorKind::ProtocolError)
                    .await;
            }
            (Opcode::Text, _) => self.start_message(MessageKind::Text),
            (Opcode::Binary, _) => self.start_message(MessageKind::Binary),
            _ => {}
        }

        self.ctx.frame = frame;
        self.ctx.header_len = 0;
        self.ctx.header_need = HEADER_START;

        if frame.opcode.is_control() {
            self.ctx.control_len = 0;
            if frame.len == 0 {
                return self.on_control().await;
            }
            self.ctx.target = Target::Control;
            return Ok(());
        }

        self.ctx.remaining = frame.len as usize;
        self.ctx.mask_pos = 0;
        if frame.len == 0 {
            if self.ctx.kind == MessageKind::Text && self.ctx.utf8.feed(&[], frame.fin).is_err() {
                return self
                    .fail(CloseCode::InvalidPayload, WsErrorKind::InvalidPayload)
                    .await;
            }
            self.end_frame();
            return Ok(());
        }
        self.ctx.target = Target::Payload;
        Ok(())
    }

    fn start_message(&mut self, kind: MessageKind) {
        self.ctx.kind = kind;
        self.ctx.first = true;
        self.ctx.fill = 0;
        self.ctx.utf8.reset();
    }

    async fn on_control_bytes(&mut self, n: usize) -> Result<(), WsErrorKind> {
        self.ctx.control_len += n;
        if self.ctx.control_len < self.ctx.frame.len as usize {
            return Ok(());
        }
        self.on_control().await
    }

    async fn on_control(&mut self) -> Result<(), WsErrorKind> {
        let len = self.ctx.frame.len as usize;
        apply_mask(&mut self.rx.control[..len], self.ctx.frame.mask, 0);
        self.ctx.target = Target::Header;

        match self.ctx.frame.opcode {
            Opcode::Ping if self.ctx.phase != Phase::Closing => {
                trace!("ping, {} bytes", len);
                Self::send_frame(
                    &mut *self.conn,
                    &mut *self.tx,
                    Opcode::Pong,
                    true,
                    &self.rx.control[..len],
                )
                .await
            }
            Opcode::Pong => {
                if self.ctx.phase == Phase::AwaitingPong {
                    self.ctx.phase = Phase::Open;
                }
                Ok(())
            }
            Opcode::Close => self.on_close_frame(len).await,
            _ => Ok(()),
        }
    }

    async fn on_close_frame(&mut self, len: usize) -> Result<(), WsErrorKind> {
        let code = match parse_close_payload(&self.rx.control[..len]) {
            Ok(code) => code,
            Err(reply) => {
                debug!("invalid close frame");
                return self.fail(reply, WsErrorKind::ProtocolError).await;
            }
        };

        if self.ctx.phase != Phase::Closing {
            let echo = code.map(u16::to_be_bytes);
            let payload: &[u8] = match &echo {
                Some(bytes) => bytes,
                None => &[],
            };
            Self::send_frame(&mut *self.conn, &mut *self.tx, Opcode::Close, true, payload).await?;
        }

        debug!("websocket closed by peer");
        self.ctx.phase = Phase::Closed;
        self.handler.on_close(code);
        Ok(())
    }

    async fn on_payload_bytes(&mut self, n: usize) -> Result<(), WsErrorKind> {
        let start = self.ctx.fill;
        let end = start + n;
        let data = &mut self.rx.payload[start..end];
        self.ctx.mask_pos = apply_mask(data, self.ctx.frame.mask, self.ctx.mask_pos);
        self.ctx.remaining -= n;
        self.ctx.fill = end;

        let frame_done = self.ctx.remaining == 0;
        if self.ctx.kind == MessageKind::Text
            && self.ctx.utf8.feed(data, frame_done && self.ctx.frame.fin).is_err()
        {
            return self
                .fail(CloseCode::InvalidPayload, WsErrorKind::InvalidPayload)
                .await;
        }

        if frame_done {
            self.end_frame();
        } else if end == self.rx.payload.len() {
            self.deliver(false);
        }
        Ok(())
    }

    fn end_frame(&mut self) {
        let fin = self.ctx.frame.fin;
        if self.ctx.fill > 0 || fin {
            self.deliver(fin);
        }
        self.ctx.rx_state = if fin {
            RxState::ExpectStart
        } else {
            RxState::ExpectContinuation
        };
        self.ctx.target = Target::Header;
    }

    fn deliver(&mut self, fin: bool) {
        if matches!(self.ctx.phase, Phase::Open | Phase::AwaitingPong) {
            let message = Message {
                kind: self.ctx.kind,
                data: &self.rx.payload[..self.ctx.fill],
                first: self.ctx.first,
                fin,
            };
            self.handler.on_message(message, self.queue);
        }
        self.ctx.first = false;
        self.ctx.fill = 0;
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use core::cell::RefCell;
    use core::time::Duration;
    use std::vec;
    use std::vec::Vec;

    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    use super::*;
    use crate::testutil::{MockConnection, Step, StepClock, client_frame};

    type Queue = CommandQueue<CriticalSectionRawMutex, 4, 256>;

    const MASK: [u8; 4] = [0x11, 0x22, 0x33, 0x44];

    #[derive(Default)]
    struct Recorder {
        echo: bool,
        messages: RefCell<Vec<(MessageKind, Vec<u8>, bool, bool)>>,
        closed: RefCell<Vec<Option<u16>>>,
        errors: RefCell<Vec<WsErrorKind>>,
    }

    impl Handler for Recorder {
        fn on_message<M: RawMutex, const Q: usize, const S: usize>(
            &self,
            message: Message<'_>,
            queue: &CommandQueue<M, Q, S>,
        ) {
            if self.echo {
                queue.try_send_binary(message.data).unwrap();
            }
            self.messages.borrow_mut().push((
                message.kind,
                message.data.to_vec(),
                message.first,
                message.fin,
            ));
        }

        fn on_close(&self, code: Option<u16>) {
            self.closed.borrow_mut().push(code);
        }

        fn on_error(&self, kind: WsErrorKind) {
            self.errors.borrow_mut().push(kind);
        }
    }

    async fn run(
        conn: &mut MockConnection,
        handler: &Recorder,
        queue: &Queue,
        clock: &StepClock,
        config: &WsConfig,
    ) -> Result<(), WsErrorKind> {
        let mut rx = [0u8; 512];
        let mut tx = [0u8; 128];
        WebSocket::new(conn, &mut rx, &mut tx, queue, handler, clock, config)
            .run()
            .await
    }

    async fn run_script(conn: &mut MockConnection, handler: &Recorder) -> Result<(), WsErrorKind> {
        let queue = Queue::new();
        run(conn, handler, &queue, &StepClock::new(0), &WsConfig::default()).await
    }

    /// Split the server's output into (opcode, fin, payload) triples.
    fn server_frames(mut bytes: &[u8]) -> Vec<(Opcode, bool, Vec<u8>)> {
        let mut frames = Vec::new();
        while !bytes.is_empty() {
            let header = FrameHeader::decode(bytes).unwrap();
            assert!(!header.masked);
            let start = header.encoded_len();
            let end = start + header.len as usize;
            frames.push((header.opcode, header.fin, bytes[start..end].to_vec()));
            bytes = &bytes[end..];
        }
        frames
    }

    #[tokio::test]
    async fn test_ping_is_answered_with_pong() {
        let mut conn = MockConnection::new(vec![Step::Data(client_frame(true, 0x9, b"hi", MASK))]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Ok(()));
        assert_eq!(server_frames(conn.written()), vec![(Opcode::Pong, true, b"hi".to_vec())]);
        assert_eq!(*handler.closed.borrow(), vec![None]);
    }

    #[tokio::test]
    async fn test_fragmented_message_is_delivered_in_order() {
        let mut script = client_frame(false, 0x1, b"Hel", MASK);
        // a ping between fragments is allowed
        script.extend(client_frame(true, 0x9, b"", MASK));
        script.extend(client_frame(true, 0x0, b"lo", MASK));
        // one byte per read
        let mut conn = MockConnection::new(script.iter().map(|b| Step::Data(vec![*b])).collect());
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Ok(()));
        assert_eq!(
            *handler.messages.borrow(),
            vec![
                (MessageKind::Text, b"Hel".to_vec(), true, false),
                (MessageKind::Text, b"lo".to_vec(), false, true),
            ]
        );
        assert_eq!(server_frames(conn.written()), vec![(Opcode::Pong, true, vec![])]);
    }

    #[tokio::test]
    async fn test_code_point_split_across_fragments_is_valid() {
        // U+20AC is e2 82 ac
        let mut script = client_frame(false, 0x1, b"a\xe2", MASK);
        script.extend(client_frame(true, 0x9, b"", MASK));
        script.extend(client_frame(true, 0x0, b"\x82\xacb", MASK));
        let mut conn = MockConnection::from_chunks(&[&script]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Ok(()));
        assert_eq!(
            *handler.messages.borrow(),
            vec![
                (MessageKind::Text, b"a\xe2".to_vec(), true, false),
                (MessageKind::Text, b"\x82\xacb".to_vec(), false, true),
            ]
        );
        assert_eq!(server_frames(conn.written()), vec![(Opcode::Pong, true, vec![])]);
        assert!(handler.errors.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_large_message_is_delivered_in_pieces() {
        let payload: Vec<u8> = (0..500u32).map(|i| i as u8).collect();
        let mut conn = MockConnection::from_chunks(&[&client_frame(true, 0x2, &payload, MASK)]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Ok(()));
        let area = 512 - 14 - 125;
        let messages = handler.messages.borrow();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], (MessageKind::Binary, payload[..area].to_vec(), true, false));
        assert_eq!(messages[1], (MessageKind::Binary, payload[area..].to_vec(), false, true));
    }

    #[tokio::test]
    async fn test_continuation_without_message_fails_with_1002() {
        let mut conn = MockConnection::from_chunks(&[&client_frame(true, 0x0, b"x", MASK)]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Err(WsErrorKind::ProtocolError));
        assert_eq!(
            server_frames(conn.written()),
            vec![(Opcode::Close, true, 1002u16.to_be_bytes().to_vec())]
        );
        assert_eq!(*handler.errors.borrow(), vec![WsErrorKind::ProtocolError]);
        assert!(handler.closed.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_new_message_inside_fragmented_message_fails_with_1002() {
        let mut script = client_frame(false, 0x2, b"a", MASK);
        script.extend(client_frame(true, 0x2, b"b", MASK));
        let mut conn = MockConnection::from_chunks(&[&script]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Err(WsErrorKind::ProtocolError));
        assert_eq!(
            server_frames(conn.written()),
            vec![(Opcode::Close, true, 1002u16.to_be_bytes().to_vec())]
        );
    }

    #[tokio::test]
    async fn test_unmasked_frame_fails_with_1002() {
        let mut conn = MockConnection::from_chunks(&[&[0x81, 0x01, b'x']]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Err(WsErrorKind::ProtocolError));
        assert_eq!(*handler.errors.borrow(), vec![WsErrorKind::ProtocolError]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails_with_1007() {
        let mut script = client_frame(false, 0x1, b"ok \xe2\x82", MASK);
        script.extend(client_frame(true, 0x0, b"A", MASK));
        let mut conn = MockConnection::from_chunks(&[&script]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Err(WsErrorKind::InvalidPayload));
        assert_eq!(
            server_frames(conn.written()),
            vec![(Opcode::Close, true, 1007u16.to_be_bytes().to_vec())]
        );
    }

    #[tokio::test]
    async fn test_oversized_length_fails_with_1009() {
        let frame = [0x82, 0xFF, 0, 0, 0, 1, 0, 0, 0, 0, 1, 2, 3, 4];
        let mut conn = MockConnection::from_chunks(&[&frame]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Err(WsErrorKind::MessageTooBig));
        assert_eq!(
            server_frames(conn.written()),
            vec![(Opcode::Close, true, 1009u16.to_be_bytes().to_vec())]
        );
    }

    #[tokio::test]
    async fn test_peer_close_is_echoed() {
        let mut conn =
            MockConnection::from_chunks(&[&client_frame(true, 0x8, &1000u16.to_be_bytes(), MASK)])
                .idle_forever();
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Ok(()));
        assert_eq!(
            server_frames(conn.written()),
            vec![(Opcode::Close, true, 1000u16.to_be_bytes().to_vec())]
        );
        assert_eq!(*handler.closed.borrow(), vec![Some(1000)]);
    }

    #[tokio::test]
    async fn test_close_with_reserved_code_is_answered_with_1002() {
        let mut conn =
            MockConnection::from_chunks(&[&client_frame(true, 0x8, &1005u16.to_be_bytes(), MASK)]);
        let handler = Recorder::default();

        assert_eq!(run_script(&mut conn, &handler).await, Err(WsErrorKind::ProtocolError));
        assert_eq!(
            server_frames(conn.written()),
            vec![(Opcode::Close, true, 1002u16.to_be_bytes().to_vec())]
        );
    }

    #[tokio::test]
    async fn test_keepalive_sends_one_ping_then_fails() {
        let mut conn = MockConnection::new(Vec::new()).idle_forever();
        let handler = Recorder::default();
        let queue = Queue::new();
        let clock = StepClock::new(400);
        let config = WsConfig::default().with_keepalive_interval(Duration::from_millis(1000));

        let result = run(&mut conn, &handler, &queue, &clock, &config).await;

        assert_eq!(result, Err(WsErrorKind::PongTimeout));
        assert_eq!(server_frames(conn.written()), vec![(Opcode::Ping, true, vec![])]);
        assert_eq!(*handler.errors.borrow(), vec![WsErrorKind::PongTimeout]);
    }

    #[tokio::test]
    async fn test_pong_keeps_session_alive() {
        let mut conn = MockConnection::new(vec![
            Step::Timeout,
            Step::Timeout,
            Step::Timeout,
            Step::Data(client_frame(true, 0xA, b"", MASK)),
            Step::Timeout,
        ]);
        let handler = Recorder::default();
        let queue = Queue::new();
        let clock = StepClock::new(400);
        let config = WsConfig::default().with_keepalive_interval(Duration::from_millis(1000));

        // the script ends with the peer going away, not a pong timeout
        assert_eq!(run(&mut conn, &handler, &queue, &clock, &config).await, Ok(()));
        assert!(handler.errors.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_queued_send_is_split_into_continuation_frames() {
        let mut conn = MockConnection::new(Vec::new());
        let handler = Recorder::default();
        let queue = Queue::new();
        queue.try_send_binary(&[7u8; 200]).unwrap();

        let result = run(&mut conn, &handler, &queue, &StepClock::new(0), &WsConfig::default()).await;

        assert_eq!(result, Ok(()));
        let room = 128 - SERVER_HEADER_LEN;
        assert_eq!(
            server_frames(conn.written()),
            vec![
                (Opcode::Binary, false, vec![7u8; room]),
                (Opcode::Continuation, true, vec![7u8; 200 - room]),
            ]
        );
    }

    #[tokio::test]
    async fn test_handler_replies_through_queue() {
        let mut conn = MockConnection::from_chunks(&[&client_frame(true, 0x2, b"echo", MASK)]);
        let handler = Recorder {
            echo: true,
            ..Recorder::default()
        };

        assert_eq!(run_script(&mut conn, &handler).await, Ok(()));
        assert_eq!(server_frames(conn.written()), vec![(Opcode::Binary, true, b"echo".to_vec())]);
    }

    #[tokio::test]
    async fn test_close_command_starts_closing_handshake() {
        let mut conn =
            MockConnection::from_chunks(&[&client_frame(true, 0x8, &1001u16.to_be_bytes(), MASK)]);
        let handler = Recorder::default();
        let queue = Queue::new();
        queue.try_close().unwrap();

        let result = run(&mut conn, &handler, &queue, &StepClock::new(0), &WsConfig::default()).await;

        assert_eq!(result, Ok(()));
        assert_eq!(
            server_frames(conn.written()),
            vec![(Opcode::Close, true, 1001u16.to_be_bytes().to_vec())]
        );
        assert_eq!(*handler.closed.borrow(), vec![Some(1001)]);
    }

    #[tokio::test]
    async fn test_close_wait_ends_with_keepalive_disabled() {
        let mut conn = MockConnection::new(Vec::new()).idle_forever();
        let handler = Recorder::default();
        let queue = Queue::new();
        queue.try_close().unwrap();
        let clock = StepClock::new(1000);
        let config = WsConfig::default()
            .with_keepalive_interval(Duration::ZERO)
            .with_close_timeout(Duration::from_secs(5));

        let result = run(&mut conn, &handler, &queue, &clock, &config).await;

        assert_eq!(result, Ok(()));
        assert_eq!(
            server_frames(conn.written()),
            vec![(Opcode::Close, true, 1001u16.to_be_bytes().to_vec())]
        );
        assert_eq!(*handler.closed.borrow(), vec![None]);
        assert!(handler.errors.borrow().is_empty());
    }
}
