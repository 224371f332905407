//! Queue of outgoing buffer groups waiting to be written.

use crate::buffers::BufferGroup;

/// Outgoing data of one connection, plus the "close when done" flag.
///
/// Groups leave the queue in the order they were appended. Once close is
/// requested nothing may be appended any more; the connection closes the
/// socket only after the queue has been drained.
#[derive(Debug, Default)]
pub struct OutgoingDataQueue {
    awaiting: Vec<BufferGroup>,
    close_when_done: bool,
}

impl OutgoingDataQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add groups at the back of the queue.
    ///
    /// Must not be called after [`set_close_when_done`](Self::set_close_when_done).
    pub fn append(&mut self, groups: Vec<BufferGroup>) {
        debug_assert!(!self.close_when_done);

        if self.awaiting.is_empty() {
            self.awaiting = groups;
        } else {
            self.awaiting.reserve(groups.len());
            self.awaiting.extend(groups);
        }
    }

    /// Take up to `max_count` groups from the front.
    ///
    /// When everything fits the whole vector is moved out and the queue is
    /// left empty; otherwise exactly `max_count` groups are drained.
    pub fn pop_ready(&mut self, max_count: usize) -> Vec<BufferGroup> {
        if max_count >= self.awaiting.len() {
            std::mem::take(&mut self.awaiting)
        } else {
            self.awaiting.drain(..max_count).collect()
        }
    }

    #[inline]
    #[must_use]
    pub fn close_when_done(&self) -> bool {
        self.close_when_done
    }

    #[inline]
    pub fn set_close_when_done(&mut self) {
        self.close_when_done = true;
    }

    /// Number of queued groups.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.awaiting.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.awaiting.is_empty()
    }
}
