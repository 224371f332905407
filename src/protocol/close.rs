//! Close status codes and close frame payloads (RFC 6455 Section 5.5.1, 7.4).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::validation::MAX_CONTROL_FRAME_PAYLOAD;

/// WebSocket close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CloseCode {
    /// 1000: the purpose of the connection has been fulfilled.
    #[default]
    Normal,
    /// 1001: endpoint is going away.
    GoingAway,
    /// 1002: malformed frame or protocol violation.
    ProtocolError,
    /// 1003: data type the endpoint cannot accept.
    UnsupportedData,
    /// 1007: payload inconsistent with the message type.
    InvalidPayload,
    /// 1008: policy violation.
    PolicyViolation,
    /// 1009: message too big to process.
    MessageTooBig,
    /// 1010: client expected an extension the server did not negotiate.
    MandatoryExtension,
    /// 1011: unexpected condition on the server.
    InternalError,
    /// Any other code (registered 1012-1014, application 3000-4999, or invalid).
    Other(u16),
}

impl CloseCode {
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Whether the code may appear in a close frame on the wire.
    ///
    /// 1004-1006 and 1015 are reserved for local use, anything below 1000 or
    /// in 1016-2999 is unassigned.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Status code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: CloseCode,
    /// UTF-8, at most 123 bytes on the wire.
    pub reason: String,
}

impl CloseFrame {
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode a close payload. An empty payload carries no status.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a 1-byte payload
    /// - `Error::InvalidCloseCode` for codes that must not be sent
    /// - `Error::InvalidUtf8` if the reason is not UTF-8
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload {
            [] => Ok(None),
            [_] => Err(Error::ProtocolViolation(
                "close payload of 1 byte".into(),
            )),
            [hi, lo, reason @ ..] => {
                let code = CloseCode::from_u16(u16::from_be_bytes([*hi, *lo]));
                if !code.is_valid() {
                    return Err(Error::InvalidCloseCode(code.as_u16()));
                }
                let reason = std::str::from_utf8(reason)?;
                Ok(Some(Self::new(code, reason)))
            }
        }
    }

    /// Encode as a close payload. Reasons longer than the control frame limit
    /// are cut on a character boundary.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let max_reason = MAX_CONTROL_FRAME_PAYLOAD - 2;
        let mut end = self.reason.len().min(max_reason);
        while !self.reason.is_char_boundary(end) {
            end -= 1;
        }

        let mut buf = BytesMut::with_capacity(2 + end);
        buf.put_u16(self.code.as_u16());
        buf.put_slice(&self.reason.as_bytes()[..end]);
        buf.freeze()
    }
}
