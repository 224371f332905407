//! Frame header encoding and incremental decoding (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                 Masking key (if MASK is set)                  |
//! +---------------------------------------------------------------+
//! ```
//!
//! The payload is not part of the header: the connection reads it separately,
//! possibly over several partial reads.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// Largest possible header: 2 fixed bytes, 8 length bytes, 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Last fragment of a message.
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    /// Masking key, present on client-to-server frames.
    pub mask: Option<[u8; 4]>,
    /// Payload length as announced on the wire.
    pub payload_len: u64,
}

impl FrameHeader {
    /// Header of a final frame with no RSV bits and no mask.
    #[must_use]
    pub const fn new(opcode: OpCode, payload_len: u64) -> Self {
        Self {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload_len,
        }
    }

    #[must_use]
    pub const fn with_fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    #[must_use]
    pub const fn with_mask(mut self, mask: Option<[u8; 4]>) -> Self {
        self.mask = mask;
        self
    }

    #[inline]
    #[must_use]
    pub const fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Decode a header from the start of `buf`.
    ///
    /// Returns the header and the number of bytes it occupies.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` does not hold the whole header yet
    /// - `Error::InvalidOpcode` / `Error::ReservedOpcode` for unknown opcodes
    /// - `Error::InvalidFrame` if a 64-bit length has its most significant bit set
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];
        let opcode = OpCode::try_from(byte0 & 0x0F)?;
        let masked = byte1 & 0x80 != 0;

        let (payload_len, len_end) = match byte1 & 0x7F {
            126 => {
                require(buf, 4)?;
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
            }
            127 => {
                require(buf, 10)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                let len = u64::from_be_bytes(raw);
                if len & (1 << 63) != 0 {
                    return Err(Error::InvalidFrame(
                        "most significant bit of 64-bit length must be 0".into(),
                    ));
                }
                (len, 10)
            }
            short => (u64::from(short), 2),
        };

        let (mask, header_len) = if masked {
            require(buf, len_end + 4)?;
            let mut key = [0u8; 4];
            key.copy_from_slice(&buf[len_end..len_end + 4]);
            (Some(key), len_end + 4)
        } else {
            (None, len_end)
        };

        let header = FrameHeader {
            fin: byte0 & 0x80 != 0,
            rsv1: byte0 & 0x40 != 0,
            rsv2: byte0 & 0x20 != 0,
            rsv3: byte0 & 0x10 != 0,
            opcode,
            mask,
            payload_len,
        };

        Ok((header, header_len))
    }

    /// Number of bytes [`write`](Self::write) produces.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let len_bytes = if self.payload_len <= 125 {
            0
        } else if self.payload_len <= 0xFFFF {
            2
        } else {
            8
        };
        let mask_bytes = if self.mask.is_some() { 4 } else { 0 };
        2 + len_bytes + mask_bytes
    }

    /// Encode into the front of `buf`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFrame` if `buf` is shorter than
    /// [`encoded_len`](Self::encoded_len).
    pub fn write(&self, buf: &mut [u8]) -> Result<usize> {
        let total = self.encoded_len();
        if buf.len() < total {
            return Err(Error::InvalidFrame(format!(
                "Buffer too small: need {} bytes, have {}",
                total,
                buf.len()
            )));
        }

        let mut byte0 = self.opcode.as_u8();
        for (bit, set) in [(0x80, self.fin), (0x40, self.rsv1), (0x20, self.rsv2), (0x10, self.rsv3)] {
            if set {
                byte0 |= bit;
            }
        }
        buf[0] = byte0;

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0 };
        let mut pos = 2;
        if self.payload_len <= 125 {
            buf[1] = mask_bit | self.payload_len as u8;
        } else if self.payload_len <= 0xFFFF {
            buf[1] = mask_bit | 126;
            buf[2..4].copy_from_slice(&(self.payload_len as u16).to_be_bytes());
            pos = 4;
        } else {
            buf[1] = mask_bit | 127;
            buf[2..10].copy_from_slice(&self.payload_len.to_be_bytes());
            pos = 10;
        }

        if let Some(key) = self.mask {
            buf[pos..pos + 4].copy_from_slice(&key);
            pos += 4;
        }

        debug_assert_eq!(pos, total);
        Ok(pos)
    }

    /// Encode into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = [0u8; MAX_HEADER_LEN];
        let n = self.encoded_len();
        // `buf` always fits the largest header.
        let _ = self.write(&mut buf);
        Bytes::copy_from_slice(&buf[..n])
    }
}

#[inline]
fn require(buf: &[u8], len: usize) -> Result<()> {
    if buf.len() < len {
        Err(Error::IncompleteFrame {
            needed: len - buf.len(),
        })
    } else {
        Ok(())
    }
}
