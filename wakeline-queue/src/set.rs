//! Fixed per-event-type table of change queues.

use std::sync::Arc;

use wakeline_domain::EventType;

use crate::queue::{ChangeQueue, OverflowPolicy};

/// One queue per event type, in a fixed enum-indexed table.
///
/// The event-type set is closed, so the table is an array rather than a
/// map; lookups are index reads and there is no locking.
pub struct QueueSet {
    queues: [Arc<ChangeQueue>; EventType::COUNT],
}

impl QueueSet {
    /// Create a queue set with the same capacity and policy for every type.
    pub fn uniform(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            queues: std::array::from_fn(|_| Arc::new(ChangeQueue::new(capacity, policy))),
        }
    }

    /// Replace the queue for a single event type.
    ///
    /// Used at configuration time before the set is shared; a high-frequency
    /// table can get a smaller sliding queue while the rest keep defaults.
    pub fn with_override(
        mut self,
        event_type: EventType,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> Self {
        self.queues[event_type.index()] = Arc::new(ChangeQueue::new(capacity, policy));
        self
    }

    /// The queue for an event type.
    pub fn queue(&self, event_type: EventType) -> &Arc<ChangeQueue> {
        &self.queues[event_type.index()]
    }

    /// Total events dropped by overflow policies across all queues.
    pub fn total_dropped(&self) -> u64 {
        self.queues.iter().map(|q| q.dropped()).sum()
    }

    /// Total events currently buffered across all queues.
    pub fn total_len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wakeline_domain::{ChangeEvent, ChangeOp, StreamPosition, Table};

    #[test]
    fn test_uniform_configuration() {
        let set = QueueSet::uniform(8, OverflowPolicy::DropNewest);
        for ty in EventType::all() {
            assert_eq!(set.queue(ty).capacity(), 8);
            assert_eq!(set.queue(ty).policy(), OverflowPolicy::DropNewest);
        }
    }

    #[test]
    fn test_override_single_type() {
        let typing_insert = EventType::new(Table::Typing, ChangeOp::Insert);
        let set = QueueSet::uniform(256, OverflowPolicy::DropOldest).with_override(
            typing_insert,
            4,
            OverflowPolicy::Sliding,
        );

        assert_eq!(set.queue(typing_insert).capacity(), 4);
        assert_eq!(set.queue(typing_insert).policy(), OverflowPolicy::Sliding);

        let other = EventType::new(Table::Messages, ChangeOp::Insert);
        assert_eq!(set.queue(other).capacity(), 256);
    }

    #[test]
    fn test_queues_are_isolated() {
        let set = QueueSet::uniform(4, OverflowPolicy::Sliding);
        let event = ChangeEvent::new(
            ChangeOp::Insert,
            Table::Messages,
            json!({"id": "m1"}),
            StreamPosition::new(1),
        );
        set.queue(event.event_type()).offer(event);

        assert_eq!(set.queue(EventType::new(Table::Messages, ChangeOp::Insert)).len(), 1);
        assert_eq!(set.queue(EventType::new(Table::Messages, ChangeOp::Update)).len(), 0);
        assert_eq!(set.total_len(), 1);
    }
}
