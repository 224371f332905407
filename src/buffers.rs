//! Byte buffers used on both directions of a connection.
//!
//! - [`FixedInputBuffer`]: reusable fixed-capacity workspace frame headers are
//!   read into.
//! - [`BufferGroup`]: ranges of outgoing bytes meant to be written together.

use bytes::Bytes;

/// Default capacity of the header input buffer.
///
/// Large enough for the biggest frame header (14 bytes) plus a few bytes of
/// payload arriving in the same read.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 18;

/// Fixed-capacity input buffer.
///
/// Bytes are appended at the tail by reads ([`read_space`](Self::read_space)
/// followed by [`obtained_bytes`](Self::obtained_bytes)) and taken from the
/// head by the parser ([`bytes`](Self::bytes) followed by
/// [`consumed_bytes`](Self::consumed_bytes)). The storage is allocated once
/// and never resized.
#[derive(Debug)]
pub struct FixedInputBuffer {
    buf: Box<[u8]>,
    ready_pos: usize,
    ready_len: usize,
}

impl FixedInputBuffer {
    /// Allocate a buffer of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            ready_pos: 0,
            ready_len: 0,
        }
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of valid bytes not consumed yet.
    #[inline]
    #[must_use]
    pub fn length(&self) -> usize {
        self.ready_len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ready_len == 0
    }

    /// Valid, unconsumed bytes.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf[self.ready_pos..self.ready_pos + self.ready_len]
    }

    /// Free space to read into.
    ///
    /// Unconsumed bytes are moved to the front first, so the returned slice is
    /// always the whole remaining capacity.
    pub fn read_space(&mut self) -> &mut [u8] {
        if self.ready_pos != 0 {
            self.buf
                .copy_within(self.ready_pos..self.ready_pos + self.ready_len, 0);
            self.ready_pos = 0;
        }
        &mut self.buf[self.ready_len..]
    }

    /// Mark `n` bytes written into [`read_space`](Self::read_space) as valid.
    pub fn obtained_bytes(&mut self, n: usize) {
        debug_assert!(self.ready_pos + self.ready_len + n <= self.buf.len());
        self.ready_len += n;
    }

    /// Drop `n` bytes from the head.
    pub fn consumed_bytes(&mut self, n: usize) {
        debug_assert!(n <= self.ready_len);
        self.ready_len -= n;
        if self.ready_len == 0 {
            self.ready_pos = 0;
        } else {
            self.ready_pos += n;
        }
    }
}

/// Ordered ranges of bytes written to the socket together.
///
/// Ranges are [`Bytes`], so staging a group for a write clones handles, never
/// payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferGroup {
    bufs: Vec<Bytes>,
}

impl BufferGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Group made of the given ranges, in order.
    #[must_use]
    pub fn from_buffers(bufs: Vec<Bytes>) -> Self {
        Self { bufs }
    }

    /// Append one more range.
    pub fn push(&mut self, buf: impl Into<Bytes>) {
        self.bufs.push(buf.into());
    }

    #[must_use]
    pub fn buffers(&self) -> &[Bytes] {
        &self.bufs
    }

    /// Sum of all range lengths.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.bufs.iter().map(Bytes::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bufs.iter().all(Bytes::is_empty)
    }

    #[must_use]
    pub fn into_buffers(self) -> Vec<Bytes> {
        self.bufs
    }
}

impl From<Bytes> for BufferGroup {
    fn from(buf: Bytes) -> Self {
        Self { bufs: vec![buf] }
    }
}

impl From<Vec<u8>> for BufferGroup {
    fn from(buf: Vec<u8>) -> Self {
        Bytes::from(buf).into()
    }
}

impl From<String> for BufferGroup {
    fn from(s: String) -> Self {
        Bytes::from(s).into()
    }
}

impl From<&'static str> for BufferGroup {
    fn from(s: &'static str) -> Self {
        Bytes::from_static(s.as_bytes()).into()
    }
}

impl From<&'static [u8]> for BufferGroup {
    fn from(s: &'static [u8]) -> Self {
        Bytes::from_static(s).into()
    }
}

impl From<Vec<Bytes>> for BufferGroup {
    fn from(bufs: Vec<Bytes>) -> Self {
        Self::from_buffers(bufs)
    }
}
