//! Change-stream transport port.
//!
//! The transport is an external collaborator: it delivers ordered per-table
//! row changes with resumable positions. Implementations live outside this
//! crate (the in-crate [`crate::stub::StubTransport`] exists for tests).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use wakeline_domain::{ChangeOp, StreamPosition, SubscriptionConfig};

/// Errors surfaced by a transport when opening a subscription.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to reach the stream source.
    #[error("Failed to connect to change stream: {0}")]
    ConnectionFailed(String),

    /// The source rejected the subscription parameters.
    #[error("Subscription rejected: {0}")]
    SubscriptionRejected(String),

    /// A raw message could not be understood.
    #[error("Invalid stream message: {0}")]
    InvalidMessage(String),
}

/// A raw message delivered on an open subscription.
#[derive(Debug, Clone)]
pub enum ChangeMessage {
    /// A row-level change.
    Change {
        /// What happened to the row
        op: ChangeOp,
        /// Opaque row payload
        row: serde_json::Value,
        /// Position of this change on the stream
        position: StreamPosition,
    },
    /// A non-data control message. Advances the delivered position, is never
    /// forwarded as an event.
    Control(ControlMessage),
}

/// Control messages carried on the stream between data messages.
#[derive(Debug, Clone, Copy)]
pub enum ControlMessage {
    /// The initial snapshot has been fully delivered up to `position`.
    SnapshotComplete {
        /// Stream position the snapshot covers
        position: StreamPosition,
    },
    /// Keep-alive carrying the source's current position.
    Heartbeat {
        /// Stream position as of the heartbeat
        position: StreamPosition,
    },
}

impl ControlMessage {
    /// The position this control message advances the subscription to.
    pub fn position(&self) -> StreamPosition {
        match self {
            ControlMessage::SnapshotComplete { position } => *position,
            ControlMessage::Heartbeat { position } => *position,
        }
    }
}

/// Port for the replicated change-stream transport.
///
/// One logical subscription per watched table. The returned channel closing
/// means the subscription disconnected; reconnect policy belongs to the
/// caller's supervisor, resuming via `StartPosition::FromCursor`.
#[async_trait]
pub trait ChangeStreamTransport: Send + Sync {
    /// Open a subscription for one table.
    ///
    /// Messages for the table arrive on the receiver in stream order.
    async fn subscribe(
        &self,
        config: &SubscriptionConfig,
    ) -> Result<mpsc::Receiver<ChangeMessage>, TransportError>;
}
