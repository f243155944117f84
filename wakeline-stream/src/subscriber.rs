//! Stream subscriber: one long-lived task per watched table.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wakeline_domain::{ChangeEvent, StreamPosition, SubscriptionConfig, Table};
use wakeline_queue::QueueSet;

use crate::position_watch::PositionIndex;
use crate::transport::{ChangeMessage, ChangeStreamTransport, TransportError};

/// Errors that end a subscription task.
///
/// A failed subscription stops only its own table; the error carries the
/// last committed position so a supervisor can resume from there.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The transport rejected or failed the subscription.
    #[error("Transport error for {table}: {source}")]
    Transport {
        /// Table whose subscription failed
        table: Table,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// The open subscription disconnected.
    #[error("Subscription for {table} disconnected (last position: {last_position})")]
    Disconnected {
        /// Table whose subscription dropped
        table: Table,
        /// Last delivered position, the resume cursor
        last_position: StreamPosition,
    },
}

impl StreamError {
    /// Table the failed subscription belonged to.
    pub fn table(&self) -> Table {
        match self {
            StreamError::Transport { table, .. } => *table,
            StreamError::Disconnected { table, .. } => *table,
        }
    }
}

/// Opens transport subscriptions and feeds the change queues.
///
/// Each spawned subscription normalizes raw messages into [`ChangeEvent`]s,
/// offers them to the queue for their event type, and records delivered
/// positions in the shared [`PositionIndex`]. The subscriber itself never
/// drops events; any loss downstream is a queue policy decision.
pub struct StreamSubscriber<T: ChangeStreamTransport> {
    transport: Arc<T>,
    queues: Arc<QueueSet>,
    positions: Arc<PositionIndex>,
}

impl<T: ChangeStreamTransport + 'static> StreamSubscriber<T> {
    /// Create a subscriber over a transport, queue set and position index.
    pub fn new(transport: Arc<T>, queues: Arc<QueueSet>, positions: Arc<PositionIndex>) -> Self {
        Self { transport, queues, positions }
    }

    /// The shared position index.
    pub fn positions(&self) -> &Arc<PositionIndex> {
        &self.positions
    }

    /// Spawn the subscription task for one table.
    ///
    /// The task runs until cancellation or failure. A failure return is the
    /// supervisor's signal that delivery for this table has stopped; other
    /// tables are unaffected.
    pub fn spawn(
        &self,
        config: SubscriptionConfig,
        shutdown: CancellationToken,
    ) -> JoinHandle<Result<(), StreamError>> {
        let transport = self.transport.clone();
        let queues = self.queues.clone();
        let positions = self.positions.clone();

        tokio::spawn(async move {
            run_subscription(transport, queues, positions, config, shutdown).await
        })
    }
}

async fn run_subscription<T: ChangeStreamTransport>(
    transport: Arc<T>,
    queues: Arc<QueueSet>,
    positions: Arc<PositionIndex>,
    config: SubscriptionConfig,
    shutdown: CancellationToken,
) -> Result<(), StreamError> {
    let table = config.table;

    let mut receiver = transport
        .subscribe(&config)
        .await
        .map_err(|source| StreamError::Transport { table, source })?;

    info!(table = %table, start = ?config.start, "Subscription opened");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(table = %table, "Subscription shut down");
                return Ok(());
            }
            message = receiver.recv() => {
                match message {
                    Some(ChangeMessage::Change { op, row, position }) => {
                        let event = ChangeEvent::new(op, table, row, position);
                        let event_type = event.event_type();

                        // A false return is an overflow drop, already
                        // counted by the queue.
                        if !queues.queue(event_type).offer(event) {
                            debug!(event_type = %event_type, %position, "Event dropped at full queue");
                        }

                        // Record after the offer so a marker wait cannot
                        // resolve before the event is visible downstream.
                        positions.record(table, position);
                    }
                    Some(ChangeMessage::Control(control)) => {
                        positions.record(table, control.position());
                    }
                    None => {
                        let last_position = positions.latest(table);
                        warn!(table = %table, %last_position, "Subscription disconnected");
                        return Err(StreamError::Disconnected { table, last_position });
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
