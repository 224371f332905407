//! Streaming UTF-8 validation for text messages (RFC 6455 Section 8.1).
//!
//! Frames are delivered one by one, so a fragmented text message is checked
//! piece by piece: a code point cut by a fragment boundary is carried over to
//! the next fragment instead of being rejected.

use crate::error::{Error, Result};

/// Validates the fragments of one text message in order.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    /// Leading bytes of a code point left open by the previous fragment.
    pending: [u8; 4],
    pending_len: usize,
}

impl Utf8Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the next fragment of the message.
    ///
    /// A truncated code point at the end of a non-final fragment is kept for
    /// the next call; at the end of the final fragment it is an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` on the first invalid sequence.
    pub fn validate(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        let mut rest = data;

        if self.pending_len > 0 {
            let take = (4 - self.pending_len).min(rest.len());
            let mut joined = self.pending;
            joined[self.pending_len..self.pending_len + take].copy_from_slice(&rest[..take]);
            let joined_len = self.pending_len + take;

            let used = match std::str::from_utf8(&joined[..joined_len]) {
                Ok(_) => take,
                Err(e) if e.valid_up_to() > 0 => e.valid_up_to() - self.pending_len,
                Err(e) if e.error_len().is_none() && !is_final => {
                    // Still short of a full code point.
                    self.pending = joined;
                    self.pending_len = joined_len;
                    return Ok(());
                }
                Err(_) => return Err(self.fail()),
            };
            self.pending_len = 0;
            rest = &rest[used..];
        }

        match std::str::from_utf8(rest) {
            Ok(_) => Ok(()),
            Err(e) if e.error_len().is_none() && !is_final => {
                let tail = &rest[e.valid_up_to()..];
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len();
                Ok(())
            }
            Err(_) => Err(self.fail()),
        }
    }

    /// Forget any carried-over bytes.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    /// A code point is open across a fragment boundary.
    #[must_use]
    pub fn has_incomplete(&self) -> bool {
        self.pending_len > 0
    }

    fn fail(&mut self) -> Error {
        self.reset();
        Error::InvalidUtf8
    }
}
