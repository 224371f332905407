//! Progress of the inbound direction of a connection.

/// Where the read loop of a connection stands.
///
/// The write direction is tracked separately by
/// [`RawOutputContext`](crate::output::RawOutputContext); the two never block
/// each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadState {
    /// `init_read` has not been called yet.
    #[default]
    Idle,
    /// A read into the header input buffer is outstanding.
    ReadingHeader,
    /// A read into the payload of the current frame is outstanding.
    ReadingPayload,
    /// Close frame received, protocol error, or socket closed.
    Stopped,
}

impl ReadState {
    /// A socket read is outstanding.
    #[must_use]
    #[inline]
    pub const fn is_reading(&self) -> bool {
        matches!(self, ReadState::ReadingHeader | ReadState::ReadingPayload)
    }
}

impl std::fmt::Display for ReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadState::Idle => write!(f, "idle"),
            ReadState::ReadingHeader => write!(f, "reading header"),
            ReadState::ReadingPayload => write!(f, "reading payload"),
            ReadState::Stopped => write!(f, "stopped"),
        }
    }
}
