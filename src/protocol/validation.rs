//! Validation of inbound frames (RFC 6455 Sections 5.1-5.5).
//!
//! Headers are checked as soon as they are parsed, before any payload
//! storage is allocated:
//! - masking rules per role
//! - RSV bits (no extensions are negotiated)
//! - frame size limit
//! - control frame rules
//! - fragmentation sequence
//!
//! Payloads are checked once complete: text is validated as UTF-8 across all
//! fragments of the message, close payloads must decode.

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::{CloseFrame, FrameHeader, OpCode, Utf8Validator};

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Validator for the inbound direction of one connection.
///
/// Keeps track of whether a fragmented data message is open, so it must see
/// every header of the connection in order.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    limits: Limits,
    accept_unmasked_frames: bool,
    in_fragmented_message: bool,
    /// Present from the first frame of a text message until its final frame.
    text: Option<Utf8Validator>,
}

impl FrameValidator {
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            limits,
            accept_unmasked_frames: false,
            in_fragmented_message: false,
            text: None,
        }
    }

    /// Accept unmasked frames on the server side (non-RFC compliant).
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Check a freshly parsed header and advance the fragmentation state.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` / `Error::MaskedServerFrame`
    /// - `Error::ReservedBitsSet`
    /// - `Error::FrameTooLarge`
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge`
    /// - `Error::ProtocolViolation` for a broken fragmentation sequence
    pub fn validate_header(&mut self, header: &FrameHeader) -> Result<()> {
        self.validate_masking(header.is_masked())?;

        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        self.limits.check_frame_size(header.payload_len)?;

        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(header.payload_len));
            }
            // Control frames may be interleaved with fragments.
            return Ok(());
        }

        match (header.opcode, self.in_fragmented_message) {
            (OpCode::Continuation, false) => {
                return Err(Error::ProtocolViolation(
                    "continuation frame without a message to continue".into(),
                ));
            }
            (OpCode::Text | OpCode::Binary, true) => {
                return Err(Error::ProtocolViolation(
                    "new data frame inside a fragmented message".into(),
                ));
            }
            _ => {}
        }
        self.in_fragmented_message = !header.fin;

        Ok(())
    }

    /// Check a complete, unmasked payload.
    ///
    /// Must be called for every frame whose header passed
    /// [`validate_header`](Self::validate_header), in order, so text split
    /// over several fragments is validated as one stream.
    ///
    /// # Errors
    ///
    /// `Error::InvalidUtf8`, `Error::InvalidCloseCode` or
    /// `Error::ProtocolViolation`.
    pub fn validate_payload(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<()> {
        match header.opcode {
            OpCode::Text => {
                let text = self.text.insert(Utf8Validator::new());
                text.validate(payload, header.fin)?;
            }
            OpCode::Continuation => {
                if let Some(text) = self.text.as_mut() {
                    text.validate(payload, header.fin)?;
                }
            }
            OpCode::Close => {
                CloseFrame::parse(payload)?;
            }
            _ => {}
        }
        if header.fin && header.opcode.is_data() {
            self.text = None;
        }
        Ok(())
    }

    fn validate_masking(&self, masked: bool) -> Result<()> {
        match self.role {
            Role::Server if !masked && !self.accept_unmasked_frames => {
                Err(Error::UnmaskedClientFrame)
            }
            Role::Client if masked => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }
}
