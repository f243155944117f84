//! Subscription configuration for watched tables.

use serde::{Deserialize, Serialize};

use crate::event_type::Table;
use crate::position::StreamPosition;

/// Where a subscription begins reading the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartPosition {
    /// Only changes made after the subscription opens
    FromNow,
    /// The full history the transport retains
    FromBeginning,
    /// Resume after a previously committed position
    FromCursor(StreamPosition),
}

/// Configuration for one table subscription.
///
/// Created at startup and immutable for the subscription's lifetime. The
/// filter and column projection are passed through to the transport verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Table to watch
    pub table: Table,
    /// Optional row filter predicate, transport syntax
    pub filter: Option<String>,
    /// Optional column projection
    pub columns: Option<Vec<String>>,
    /// Where to start reading
    pub start: StartPosition,
}

impl SubscriptionConfig {
    /// Subscribe to a table from now, all rows, all columns.
    pub fn new(table: Table) -> Self {
        Self { table, filter: None, columns: None, start: StartPosition::FromNow }
    }

    /// Set a row filter predicate.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Restrict the delivered columns.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Set the start position.
    pub fn starting_at(mut self, start: StartPosition) -> Self {
        self.start = start;
        self
    }
}
