//! The typed change event delivered to handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_type::{ChangeOp, EventType, Table};
use crate::position::StreamPosition;

/// One row-level change, normalized from a raw transport message.
///
/// Immutable once constructed: the subscriber builds it, exactly one
/// dispatcher consumer takes it, handlers see shared clones. The row payload
/// is opaque JSON; consumers that care about schema deserialize it
/// themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the row
    pub op: ChangeOp,
    /// Table the row belongs to
    pub table: Table,
    /// Opaque row payload
    pub row: serde_json::Value,
    /// Where on the stream this change was delivered
    pub position: StreamPosition,
    /// When the subscriber observed the change
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create a change event observed now.
    pub fn new(
        op: ChangeOp,
        table: Table,
        row: serde_json::Value,
        position: StreamPosition,
    ) -> Self {
        Self { op, table, row, position, observed_at: Utc::now() }
    }

    /// Routing key for this event.
    pub fn event_type(&self) -> EventType {
        EventType::new(self.table, self.op)
    }
}
