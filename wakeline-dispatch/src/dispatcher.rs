//! Dispatcher: one consumer loop per event type, concurrent fan-out.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use wakeline_domain::{ChangeEvent, EventType};
use wakeline_queue::{ChangeQueue, QueueSet};

use crate::registry::HandlerRegistry;
use crate::retry::{invoke_with_retry, RetryPolicy};

/// Drains the change queues and fans events out to registered handlers.
///
/// Exactly one consumer loop per event type. Handler invocations are handed
/// off to detached tracked tasks, so a slow or failing handler never stalls
/// the loop's take-side throughput; the queue bound is the only
/// backpressure. Delivery is at-least-once per handler, independently.
pub struct Dispatcher {
    queues: Arc<QueueSet>,
    registry: Arc<HandlerRegistry>,
    retry: RetryPolicy,
    /// In-flight handler invocations, for the shutdown grace period.
    tracker: TaskTracker,
    /// Interrupts in-flight invocations once the grace period expires.
    hard_cancel: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher over a queue set and handler registry.
    pub fn new(queues: Arc<QueueSet>, registry: Arc<HandlerRegistry>, retry: RetryPolicy) -> Self {
        Self {
            queues,
            registry,
            retry,
            tracker: TaskTracker::new(),
            hard_cancel: CancellationToken::new(),
        }
    }

    /// The handler registry, for registration at any time.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Launch one consumer task per event type.
    ///
    /// Consumers run until `shutdown` is cancelled. Returns the join
    /// handles so the owner can await loop termination.
    pub fn start(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(consumers = EventType::COUNT, "Starting dispatcher consumer loops");

        EventType::all()
            .map(|event_type| {
                let queue = self.queues.queue(event_type).clone();
                let registry = self.registry.clone();
                let retry = self.retry;
                let tracker = self.tracker.clone();
                let hard_cancel = self.hard_cancel.clone();
                let shutdown = shutdown.clone();

                tokio::spawn(async move {
                    consume_loop(event_type, queue, registry, retry, tracker, hard_cancel, shutdown)
                        .await;
                })
            })
            .collect()
    }

    /// Wait for in-flight handler invocations to finish.
    ///
    /// Invocations still running after `grace` are interrupted.
    pub async fn drain(&self, grace: Duration) {
        self.tracker.close();

        if timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "Grace period expired, interrupting handlers");
            self.hard_cancel.cancel();
            self.tracker.wait().await;
        }
    }
}

async fn consume_loop(
    event_type: EventType,
    queue: Arc<ChangeQueue>,
    registry: Arc<HandlerRegistry>,
    retry: RetryPolicy,
    tracker: TaskTracker,
    hard_cancel: CancellationToken,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = queue.take() => event,
        };

        // Snapshot fresh on every dispatch so late registrations apply.
        let handlers = registry.handlers_for(event_type);
        if handlers.is_empty() {
            continue;
        }

        for handler in handlers {
            let event = event.clone();
            let hard_cancel = hard_cancel.clone();

            // Detached: the loop moves on to the next event immediately.
            tracker.spawn(async move {
                dispatch_one(retry, handler.as_ref(), &event, hard_cancel).await;
            });
        }
    }
}

async fn dispatch_one(
    retry: RetryPolicy,
    handler: &dyn crate::handler::EventHandler,
    event: &ChangeEvent,
    hard_cancel: CancellationToken,
) {
    tokio::select! {
        _ = hard_cancel.cancelled() => {
            warn!(
                handler = handler.name(),
                event_type = %event.event_type(),
                "Handler interrupted at shutdown"
            );
        }
        result = invoke_with_retry(retry, handler, event) => {
            if let Err(cause) = result {
                error!(
                    handler = handler.name(),
                    event_type = %event.event_type(),
                    position = %event.position,
                    error = %cause,
                    "Handler failed after retries, event abandoned for this handler"
                );
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
