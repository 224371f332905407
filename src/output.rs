//! Bookkeeping for the single write a connection may have in flight.

use bytes::Bytes;

use crate::buffers::BufferGroup;
use crate::queue::OutgoingDataQueue;

/// Default cap on the number of groups one vectored write carries.
pub const DEFAULT_MAX_GROUPS_PER_WRITE: usize = 64;

/// Owns the buffer groups currently being written and whether a write is
/// outstanding.
#[derive(Debug)]
pub struct RawOutputContext {
    staged: Vec<BufferGroup>,
    transmitting: bool,
    max_groups: usize,
}

impl Default for RawOutputContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GROUPS_PER_WRITE)
    }
}

impl RawOutputContext {
    #[must_use]
    pub fn new(max_groups: usize) -> Self {
        Self {
            staged: Vec::new(),
            transmitting: false,
            max_groups: max_groups.max(1),
        }
    }

    /// Whether a write is outstanding on the socket.
    #[inline]
    #[must_use]
    pub fn transmitting(&self) -> bool {
        self.transmitting
    }

    /// Stage the next bunch of groups from `queue`.
    ///
    /// Returns `false` when the queue had nothing to send. Must not be called
    /// while transmitting.
    pub fn obtain_bufs(&mut self, queue: &mut OutgoingDataQueue) -> bool {
        debug_assert!(!self.transmitting);

        self.staged = queue.pop_ready(self.max_groups);
        self.transmitting = !self.staged.is_empty();
        self.transmitting
    }

    /// Flattened ranges of all staged groups, ready for one vectored write.
    ///
    /// Empty ranges are skipped.
    #[must_use]
    pub fn create_bufs(&self) -> Vec<Bytes> {
        debug_assert!(self.transmitting);

        self.staged
            .iter()
            .flat_map(BufferGroup::buffers)
            .filter(|b| !b.is_empty())
            .cloned()
            .collect()
    }

    /// Number of staged groups.
    #[inline]
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// The outstanding write finished: release the staged groups.
    pub fn done(&mut self) {
        debug_assert!(self.transmitting);

        self.staged = Vec::new();
        self.transmitting = false;
    }
}
