//! Per-table watch of the latest delivered stream position.
//!
//! This is the consistency primitive the write coordinator waits on: the
//! subscriber records every delivered position, and a waiter suspends until
//! the position for a table reaches a transaction marker, with a deadline.
//! No polling loop and no global state; the index is passed where needed.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::debug;

use wakeline_domain::{StreamPosition, Table, TransactionMarker};

/// Errors from waiting on a position.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionWaitError {
    /// The deadline passed before the position was reached.
    #[error("Timed out waiting for {marker} (latest delivered: {latest})")]
    Timeout {
        /// The marker that was awaited
        marker: TransactionMarker,
        /// Latest delivered position for the table at the deadline
        latest: StreamPosition,
    },
}

/// Latest delivered stream position per table, with change notification.
pub struct PositionIndex {
    channels: [watch::Sender<StreamPosition>; Table::ALL.len()],
}

impl PositionIndex {
    /// Create an index with every table at the start position.
    pub fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| watch::channel(StreamPosition::START).0),
        }
    }

    /// Record a delivered position for a table.
    ///
    /// Positions are monotonic per table; a stale position is ignored so a
    /// late control message can never move the watch backwards.
    pub fn record(&self, table: Table, position: StreamPosition) {
        self.channels[table.index()].send_if_modified(|current| {
            if position > *current {
                *current = position;
                true
            } else {
                false
            }
        });
    }

    /// The latest delivered position for a table.
    pub fn latest(&self, table: Table) -> StreamPosition {
        *self.channels[table.index()].borrow()
    }

    /// Suspend until the marker's table reaches the marker's position, or
    /// the deadline passes.
    ///
    /// Returns the position that satisfied the wait. Cancellation-safe: the
    /// caller may race this future against its own cancellation token.
    pub async fn wait_for(
        &self,
        marker: &TransactionMarker,
        deadline: Duration,
    ) -> Result<StreamPosition, PositionWaitError> {
        let mut receiver = self.channels[marker.table().index()].subscribe();
        let target = *marker;

        // Extract the position before matching; the `watch::Ref` inside the
        // result borrows `receiver` and must not outlive this statement.
        let observed = timeout(deadline, receiver.wait_for(|pos| target.is_covered_by(*pos)))
            .await
            .map(|waited| waited.map(|position| *position));

        match observed {
            Ok(Ok(position)) => {
                debug!(%marker, %position, "Marker observed on stream");
                Ok(position)
            }
            // The sender lives in `self`, so the channel can only close if
            // the index is dropped mid-wait; report it as a timeout.
            Ok(Err(_)) | Err(_) => Err(PositionWaitError::Timeout {
                marker: target,
                latest: self.latest(marker.table()),
            }),
        }
    }
}

impl Default for PositionIndex {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
