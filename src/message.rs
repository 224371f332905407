//! Messages exchanged with the connection's user.
//!
//! Inbound, each complete frame is handed to the message handler as one
//! [`WsMessage`]: `fin` tells whether a fragmented message continues. Outbound,
//! a message is serialized into a single [`BufferGroup`] (header range plus
//! payload range) and queued like any other data.

use bytes::Bytes;

use crate::buffers::BufferGroup;
use crate::error::Result;
use crate::protocol::{CloseCode, CloseFrame, FrameHeader, OpCode, apply_mask};

/// One WebSocket frame's worth of message data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsMessage {
    /// Last frame of the message.
    pub fin: bool,
    pub opcode: OpCode,
    /// Unmasked payload.
    pub payload: Bytes,
}

impl WsMessage {
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        let text: String = s.into();
        Self::new(true, OpCode::Text, text)
    }

    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Close message with a status code and reason.
    #[must_use]
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Self::new(true, OpCode::Close, CloseFrame::new(code, reason).encode())
    }

    #[inline]
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Payload as text, if it is UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Decode the payload of a close message.
    ///
    /// Returns `Ok(None)` for other opcodes and for close messages without a
    /// status code.
    ///
    /// # Errors
    ///
    /// Propagates decoding errors from [`CloseFrame::parse`].
    pub fn close_frame(&self) -> Result<Option<CloseFrame>> {
        if self.opcode == OpCode::Close {
            CloseFrame::parse(&self.payload)
        } else {
            Ok(None)
        }
    }

    /// Header describing this message on the wire.
    #[must_use]
    pub fn header(&self, mask: Option<[u8; 4]>) -> FrameHeader {
        FrameHeader::new(self.opcode, self.payload.len() as u64)
            .with_fin(self.fin)
            .with_mask(mask)
    }

    /// Serialize as one buffer group. With a mask the payload is copied and
    /// masked; without one it is shared.
    #[must_use]
    pub fn into_buffer_group(self, mask: Option<[u8; 4]>) -> BufferGroup {
        let header = self.header(mask).to_bytes();
        let payload = match mask {
            Some(key) => {
                let mut masked = self.payload.to_vec();
                apply_mask(&mut masked, key);
                Bytes::from(masked)
            }
            None => self.payload,
        };
        BufferGroup::from_buffers(vec![header, payload])
    }
}
