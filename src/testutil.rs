//! Scripted transports and clocks shared by the unit tests.
extern crate std;

use core::cell::Cell;
use std::collections::VecDeque;
use std::vec::Vec;

use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

use crate::Connection;
use crate::clock::Clock;

pub(crate) enum Step {
    Data(Vec<u8>),
    Timeout,
    Reset,
}

/// Replays `Step`s on read and records every write.  Once the script is exhausted reads either
/// report end of stream or keep timing out.
pub(crate) struct MockConnection {
    script: VecDeque<Step>,
    written: Vec<u8>,
    idle_forever: bool,
    pub(crate) shutdown: bool,
}

impl MockConnection {
    pub(crate) fn new(script: Vec<Step>) -> Self {
        Self {
            script: script.into(),
            written: Vec::new(),
            idle_forever: false,
            shutdown: false,
        }
    }

    pub(crate) fn from_chunks(chunks: &[&[u8]]) -> Self {
        Self::new(chunks.iter().map(|c| Step::Data(c.to_vec())).collect())
    }

    /// Time out instead of reporting end of stream once the script runs dry.
    pub(crate) fn idle_forever(mut self) -> Self {
        self.idle_forever = true;
        self
    }

    pub(crate) fn written(&self) -> &[u8] {
        &self.written
    }
}

impl ErrorType for MockConnection {
    type Error = ErrorKind;
}

impl Read for MockConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.script.pop_front() {
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.script.push_front(Step::Data(data.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::Timeout) => Err(ErrorKind::TimedOut),
            Some(Step::Reset) => Err(ErrorKind::ConnectionReset),
            None if self.idle_forever => Err(ErrorKind::TimedOut),
            None => Ok(0),
        }
    }
}

impl Write for MockConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for MockConnection {
    async fn shutdown(&mut self) {
        self.shutdown = true;
    }
}

/// A clock that moves forward by `step` milliseconds every time it is read.
pub(crate) struct StepClock {
    now: Cell<u64>,
    step: u64,
}

impl StepClock {
    pub(crate) fn new(step: u64) -> Self {
        Self {
            now: Cell::new(0),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

/// Build a masked client frame.
pub(crate) fn client_frame(fin: bool, opcode: u8, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.push(if fin { 0x80 } else { 0 } | opcode);
    match payload.len() {
        n if n <= 125 => frame.push(0x80 | n as u8),
        n if n <= u16::MAX as usize => {
            frame.push(0x80 | 126);
            frame.extend_from_slice(&(n as u16).to_be_bytes());
        }
        n => {
            frame.push(0x80 | 127);
            frame.extend_from_slice(&(n as u64).to_be_bytes());
        }
    }
    frame.extend_from_slice(&mask);
    frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    frame
}
