//! Error types for the WebSocket connection engine.
//!
//! Protocol violations detected while parsing inbound frames are mapped to the
//! close status code sent back to the peer. Transport failures are carried as
//! strings so that `Error` stays `Clone + Eq`.

use std::io;

use thiserror::Error;

use crate::protocol::CloseCode;

/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a WebSocket connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Connection has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A read was requested while another one is outstanding.
    #[error("Read operation already in progress")]
    ReadInProgress,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid close code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(u64),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),
}

impl Error {
    /// Status code to put into the close frame answering this error.
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Error::FrameTooLarge { .. } => CloseCode::MessageTooBig,
            Error::InvalidUtf8 => CloseCode::InvalidPayload,
            Error::Io(_) | Error::ConnectionClosed | Error::ReadInProgress => {
                CloseCode::InternalError
            }
            _ => CloseCode::ProtocolError,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

/// Marker carried by the I/O error that in-flight operations complete with
/// once the connection is closed on purpose.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation aborted")]
pub struct OperationAborted;

/// Build the cancellation error delivered to an aborted socket operation.
#[must_use]
pub fn operation_aborted() -> io::Error {
    io::Error::other(OperationAborted)
}

/// Check whether `err` is the cancellation produced by [`operation_aborted`].
#[must_use]
pub fn is_operation_aborted(err: &io::Error) -> bool {
    err.get_ref()
        .is_some_and(|inner| inner.is::<OperationAborted>())
}
