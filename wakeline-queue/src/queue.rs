//! Bounded change queue with configurable overflow policy.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;
use wakeline_domain::ChangeEvent;

// =============================================================================
// Overflow Policy
// =============================================================================

/// What happens when an event is offered to a full queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the head to admit the new tail.
    DropOldest,
    /// Reject the incoming event; the producer sees `false`.
    DropNewest,
    /// As `DropOldest`, and the default: favors freshness over completeness,
    /// which is what high-frequency tables like `typing` want.
    #[default]
    Sliding,
}

impl OverflowPolicy {
    /// Policy name for logging and config parsing.
    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowPolicy::DropOldest => "drop_oldest",
            OverflowPolicy::DropNewest => "drop_newest",
            OverflowPolicy::Sliding => "sliding",
        }
    }
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Change Queue
// =============================================================================

/// Bounded FIFO of change events for one event type.
///
/// Producers `offer` without ever blocking; the consumer `take`s, suspending
/// while the queue is empty. Concurrent takes are allowed (events are popped
/// under the lock, never duplicated) but the intended shape is a single
/// consumer loop per queue.
///
/// Length never exceeds capacity. Overflow drops are counted, not raised.
pub struct ChangeQueue {
    inner: Mutex<VecDeque<ChangeEvent>>,
    notify: Notify,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl ChangeQueue {
    /// Create a queue with the given capacity and overflow policy.
    ///
    /// Capacity is clamped to at least 1.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer an event. Never blocks.
    ///
    /// Returns whether the event was admitted. Under `DropOldest` and
    /// `Sliding` the answer is always `true` (the head may have been evicted
    /// to make room); only a full `DropNewest` queue rejects.
    pub fn offer(&self, event: ChangeEvent) -> bool {
        let mut inner = self.inner.lock().expect("queue lock poisoned");

        if inner.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest | OverflowPolicy::Sliding => {
                    inner.pop_front();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                OverflowPolicy::DropNewest => {
                    drop(inner);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            }
        }

        inner.push_back(event);
        drop(inner);
        self.notify.notify_one();
        true
    }

    /// Take the next event, suspending until one is available.
    pub async fn take(&self) -> ChangeEvent {
        loop {
            // Register interest before checking, so a concurrent offer's
            // notification is not lost between the check and the await.
            let notified = self.notify.notified();

            if let Some(event) = self.try_take() {
                return event;
            }

            notified.await;
        }
    }

    /// Take the next event without blocking.
    pub fn try_take(&self) -> Option<ChangeEvent> {
        self.inner.lock().expect("queue lock poisoned").pop_front()
    }

    /// Current queue length.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured overflow policy.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Events dropped by the overflow policy since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wakeline_domain::{ChangeOp, StreamPosition, Table};

    fn event(n: u64) -> ChangeEvent {
        ChangeEvent::new(
            ChangeOp::Insert,
            Table::Messages,
            json!({"n": n}),
            StreamPosition::new(n),
        )
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        for policy in
            [OverflowPolicy::DropOldest, OverflowPolicy::DropNewest, OverflowPolicy::Sliding]
        {
            let queue = ChangeQueue::new(4, policy);
            for n in 0..100 {
                queue.offer(event(n));
                assert!(queue.len() <= 4, "policy {} exceeded capacity", policy);
            }
        }
    }

    #[test]
    fn test_sliding_keeps_most_recent_in_order() {
        let queue = ChangeQueue::new(3, OverflowPolicy::Sliding);
        for n in 0..10 {
            assert!(queue.offer(event(n)));
        }

        let survivors: Vec<u64> =
            std::iter::from_fn(|| queue.try_take()).map(|e| e.position.offset()).collect();
        assert_eq!(survivors, vec![7, 8, 9]);
        assert_eq!(queue.dropped(), 7);
    }

    #[test]
    fn test_drop_newest_rejects_incoming() {
        let queue = ChangeQueue::new(2, OverflowPolicy::DropNewest);
        assert!(queue.offer(event(0)));
        assert!(queue.offer(event(1)));
        assert!(!queue.offer(event(2)));

        let survivors: Vec<u64> =
            std::iter::from_fn(|| queue.try_take()).map(|e| e.position.offset()).collect();
        assert_eq!(survivors, vec![0, 1]);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_fifo_order_without_overflow() {
        let queue = ChangeQueue::new(16, OverflowPolicy::DropOldest);
        for n in 0..10 {
            queue.offer(event(n));
        }

        let order: Vec<u64> =
            std::iter::from_fn(|| queue.try_take()).map(|e| e.position.offset()).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
        assert_eq!(queue.dropped(), 0);
    }

    #[tokio::test]
    async fn test_take_waits_for_offer() {
        let queue = Arc::new(ChangeQueue::new(4, OverflowPolicy::Sliding));

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take().await })
        };

        // Give the consumer time to park on the empty queue.
        tokio::task::yield_now().await;
        queue.offer(event(42));

        let taken = consumer.await.unwrap();
        assert_eq!(taken.position.offset(), 42);
    }

    #[tokio::test]
    async fn test_concurrent_takes_do_not_duplicate() {
        let queue = Arc::new(ChangeQueue::new(64, OverflowPolicy::DropNewest));
        for n in 0..20 {
            queue.offer(event(n));
        }

        let a = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..10 {
                    seen.push(queue.take().await.position.offset());
                }
                seen
            })
        };
        let b = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..10 {
                    seen.push(queue.take().await.position.offset());
                }
                seen
            })
        };

        let mut all = a.await.unwrap();
        all.extend(b.await.unwrap());
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_capacity_clamped_to_one() {
        let queue = ChangeQueue::new(0, OverflowPolicy::Sliding);
        assert_eq!(queue.capacity(), 1);
        queue.offer(event(1));
        queue.offer(event(2));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_take().unwrap().position.offset(), 2);
    }
}
