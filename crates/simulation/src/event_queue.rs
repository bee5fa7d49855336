//! Event queue key with deterministic ordering.

use std::cmp::Ordering;
use std::time::Duration;

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Priority (lower fires first; defaults to the event-kind ordinal)
/// 3. Sequence number (FIFO for same time/priority)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    /// When this event should be processed.
    pub time: Duration,
    /// Priority for ordering at the same time.
    pub priority: u8,
    /// Sequence number for deterministic FIFO ordering.
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order by time first
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Then by priority (orphan replay < injected delivery < defaults)
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Finally by sequence (FIFO)
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
