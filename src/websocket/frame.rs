//! Frame header encoding and decoding.
//!
//! ```text
//! byte0: FIN(1) RSV(3) OPCODE(4)
//! byte1: MASK(1) LEN7(7)
//! if LEN7==126: LEN16 (2 bytes, big-endian)
//! if LEN7==127: LEN64 (8 bytes, big-endian)
//! if MASK: MASK_KEY (4 bytes)
//! ```

use crate::arena::WS_CONTROL_LEN;

const FIN_BIT: u8 = 0b1000_0000;
const RSV_BITS: u8 = 0b0111_0000;
const OPCODE_BITS: u8 = 0b0000_1111;
const MASK_BIT: u8 = 0b1000_0000;
const LEN7_BITS: u8 = 0b0111_1111;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

/// Frame opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    /// Continuation of a fragmented message
    Continuation = 0x0,
    /// UTF-8 text
    Text = 0x1,
    /// Binary data
    Binary = 0x2,
    /// Close handshake
    Close = 0x8,
    /// Ping
    Ping = 0x9,
    /// Pong
    Pong = 0xA,
}

impl Opcode {
    /// Control opcodes have bit 0x8 set.
    pub fn is_control(self) -> bool {
        (self as u8) & 0x8 != 0
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            _ => Err(FrameError::Protocol("reserved opcode")),
        }
    }
}

/// Errors decoding or encoding a frame header
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// More header bytes are required; the value is how many
    InsufficientData(usize),
    /// The header violates the protocol
    Protocol(&'static str),
    /// The payload length is not representable in 32 bits
    TooLarge,
    /// The destination cannot hold the encoded header
    BufferTooSmall,
}

/// A decoded frame header.  Payload bytes are never copied into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameHeader {
    /// Final fragment of a message
    pub fin: bool,
    /// The three reserved bits, right aligned
    pub rsv: u8,
    /// Frame opcode
    pub opcode: Opcode,
    /// Payload is masked
    pub masked: bool,
    /// Mask key, zero when unmasked
    pub mask: [u8; 4],
    /// Payload length
    pub len: u32,
}

impl FrameHeader {
    /// An unmasked header, as sent by the server.
    pub fn new(opcode: Opcode, fin: bool, len: u32) -> Self {
        Self {
            fin,
            rsv: 0,
            opcode,
            masked: false,
            mask: [0; 4],
            len,
        }
    }

    /// Decode a header from `value`, which holds the header bytes received so far.  Returns
    /// `FrameError::InsufficientData(n)` when `n` more bytes are needed.  Frames that are
    /// malformed regardless of connection state (reserved bits or opcodes, oversized or
    /// fragmented control frames) are rejected here.
    pub fn decode(value: &[u8]) -> Result<Self, FrameError> {
        let mut required_bytes = 2usize;

        if value.len() < required_bytes {
            return Err(FrameError::InsufficientData(required_bytes - value.len()));
        }

        let fin = value[0] & FIN_BIT == FIN_BIT;
        let rsv = (value[0] & RSV_BITS) >> 4;
        let opcode = Opcode::try_from(value[0] & OPCODE_BITS)?;
        let masked = value[1] & MASK_BIT == MASK_BIT;
        let len7 = value[1] & LEN7_BITS;

        if rsv != 0 {
            return Err(FrameError::Protocol("reserved bits set"));
        }

        if opcode.is_control() {
            if !fin {
                return Err(FrameError::Protocol("fragmented control frame"));
            }
            if len7 as usize > WS_CONTROL_LEN {
                return Err(FrameError::Protocol("control frame payload too long"));
            }
        }

        let len: u64 = match len7 {
            LEN_16 => {
                required_bytes += 2;
                if value.len() < required_bytes {
                    return Err(FrameError::InsufficientData(required_bytes - value.len()));
                }
                u16::from_be_bytes([value[2], value[3]]) as u64
            }
            LEN_64 => {
                required_bytes += 8;
                if value.len() < required_bytes {
                    return Err(FrameError::InsufficientData(required_bytes - value.len()));
                }
                let mut be = [0u8; 8];
                be.copy_from_slice(&value[2..10]);
                u64::from_be_bytes(be)
            }
            n => n as u64,
        };

        if len >> 63 != 0 {
            return Err(FrameError::Protocol("most significant length bit set"));
        }
        let len = u32::try_from(len).or(Err(FrameError::TooLarge))?;

        let mut mask = [0u8; 4];
        if masked {
            let mask_offset = required_bytes;
            required_bytes += 4;
            if value.len() < required_bytes {
                return Err(FrameError::InsufficientData(required_bytes - value.len()));
            }
            mask.copy_from_slice(&value[mask_offset..mask_offset + 4]);
        }

        Ok(FrameHeader {
            fin,
            rsv,
            opcode,
            masked,
            mask,
            len,
        })
    }

    /// Reject headers a server must not accept from a client: unmasked frames and frames
    /// masked with an all zero key.
    pub fn check_client(&self) -> Result<(), FrameError> {
        if !self.masked {
            return Err(FrameError::Protocol("client frame is not masked"));
        }
        if self.mask == [0; 4] {
            return Err(FrameError::Protocol("client frame mask key is zero"));
        }
        Ok(())
    }

    /// Encoded size of this header.
    pub fn encoded_len(&self) -> usize {
        let ext = match self.len {
            0..=125 => 0,
            126..=0xFFFF => 2,
            _ => 8,
        };
        2 + ext + if self.masked { 4 } else { 0 }
    }

    /// Encode into the front of `dest`, returning the number of bytes written.
    pub fn encode(&self, dest: &mut [u8]) -> Result<usize, FrameError> {
        let header_len = self.encoded_len();
        if dest.len() < header_len {
            return Err(FrameError::BufferTooSmall);
        }

        dest[0] = (self.opcode as u8) | (self.rsv & 0x7) << 4;
        if self.fin {
            dest[0] |= FIN_BIT;
        }

        let mut offset = 2;
        match self.len {
            n @ 0..=125 => dest[1] = n as u8,
            n @ 126..=0xFFFF => {
                dest[1] = LEN_16;
                dest[2..4].copy_from_slice(&(n as u16).to_be_bytes());
                offset = 4;
            }
            n => {
                dest[1] = LEN_64;
                dest[2..10].copy_from_slice(&(n as u64).to_be_bytes());
                offset = 10;
            }
        }

        if self.masked {
            dest[1] |= MASK_BIT;
            dest[offset..offset + 4].copy_from_slice(&self.mask);
            offset += 4;
        }

        Ok(offset)
    }
}
