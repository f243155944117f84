//! Pipeline: wires the subscriber, queues, dispatcher and coordinator.
//!
//! # Lifecycle
//!
//! 1. Build from a [`Config`] and a transport
//! 2. Register handlers (before or after start)
//! 3. `start` the subscriptions and consumer loops
//! 4. Watch the returned failure channel for degraded tables
//! 5. `shutdown` cancels tasks and drains in-flight handlers with a grace
//!    period

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use wakeline_dispatch::{Dispatcher, EventHandler, HandlerRegistry};
use wakeline_domain::{EventType, SubscriptionConfig, Table};
use wakeline_queue::QueueSet;
use wakeline_stream::{ChangeStreamTransport, PositionIndex, StreamError, StreamSubscriber};
use wakeline_write::{LocalProjection, MutationCoordinator, WritePort};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};

/// The CDC pipeline: transport → subscriber → queues → dispatcher.
///
/// Also hands out [`MutationCoordinator`]s wired to the same position index,
/// closing the optimistic-write consistency loop against the same stream.
pub struct Pipeline<T: ChangeStreamTransport + 'static> {
    config: Config,
    queues: Arc<QueueSet>,
    registry: Arc<HandlerRegistry>,
    positions: Arc<PositionIndex>,
    subscriber: StreamSubscriber<T>,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: ChangeStreamTransport + 'static> Pipeline<T> {
    /// Build a pipeline over a transport.
    pub fn new(config: Config, transport: Arc<T>) -> Self {
        let mut queues = QueueSet::uniform(config.queue.capacity, config.queue.policy);
        for over in &config.queue_overrides {
            queues = queues.with_override(over.event_type, over.capacity, over.policy);
        }
        let queues = Arc::new(queues);

        let registry = Arc::new(HandlerRegistry::new());
        let positions = Arc::new(PositionIndex::new());
        let subscriber = StreamSubscriber::new(transport, queues.clone(), positions.clone());
        let dispatcher = Dispatcher::new(queues.clone(), registry.clone(), config.retry);

        Self {
            config,
            queues,
            registry,
            positions,
            subscriber,
            dispatcher,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler for an event type.
    ///
    /// Effective for all subsequently consumed events; history is not
    /// replayed. Returns `false` if this instance was already registered.
    pub fn register(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> bool {
        self.registry.register(event_type, handler)
    }

    /// Shared per-table delivered-position index.
    pub fn positions(&self) -> &Arc<PositionIndex> {
        &self.positions
    }

    /// The change queues, for operational visibility (lengths, drop counts).
    pub fn queues(&self) -> &Arc<QueueSet> {
        &self.queues
    }

    /// Build a mutation coordinator backed by this pipeline's stream.
    pub fn coordinator<W: WritePort>(
        &self,
        writer: Arc<W>,
        projection: Arc<LocalProjection>,
    ) -> MutationCoordinator<W> {
        MutationCoordinator::new(writer, projection, self.positions.clone(), self.config.confirm_timeout)
    }

    /// Start the consumer loops and one subscription task per config.
    ///
    /// Returns the supervisor channel: every subscription failure is
    /// delivered there exactly once, carrying the table and resume cursor.
    /// Restart policy belongs to the caller; other tables keep flowing.
    pub fn start(
        &self,
        subscriptions: Vec<SubscriptionConfig>,
    ) -> PipelineResult<mpsc::Receiver<StreamError>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::AlreadyStarted);
        }

        info!(
            subscriptions = subscriptions.len(),
            queue_capacity = self.config.queue.capacity,
            queue_policy = %self.config.queue.policy,
            "Starting pipeline"
        );

        let mut tasks = self.tasks.lock().expect("pipeline lock poisoned");
        tasks.extend(self.dispatcher.start(self.shutdown.clone()));

        let (failure_tx, failure_rx) = mpsc::channel(Table::ALL.len());
        for subscription in subscriptions {
            let handle = self.subscriber.spawn(subscription, self.shutdown.clone());
            tasks.push(Self::watch_subscription(handle, failure_tx.clone()));
        }

        Ok(failure_rx)
    }

    /// Supervise one subscription task: surface its failure, never swallow it.
    fn watch_subscription(
        handle: JoinHandle<Result<(), StreamError>>,
        failures: mpsc::Sender<StreamError>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(cause)) => {
                    error!(
                        table = %cause.table(),
                        error = %cause,
                        "Subscription failed; event delivery for this table degraded"
                    );
                    let _ = failures.send(cause).await;
                }
                Err(join_error) => {
                    error!(error = %join_error, "Subscription task aborted");
                }
            }
        })
    }

    /// Graceful shutdown: stop subscriptions and consumers, then give
    /// in-flight handler invocations the configured grace period.
    pub async fn shutdown(&self) {
        info!("Shutting down pipeline");
        self.shutdown.cancel();

        let tasks: Vec<_> = self.tasks.lock().expect("pipeline lock poisoned").drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        self.dispatcher.drain(self.config.shutdown_grace).await;
        info!(total_dropped = self.queues.total_dropped(), "Pipeline stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================
