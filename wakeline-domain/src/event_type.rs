//! Event routing keys.
//!
//! The watched table set is closed and known at configuration time, so both
//! `Table` and `EventType` are enumerable. This keeps dispatch tables as
//! fixed arrays instead of string-keyed maps and gives exhaustiveness
//! checking wherever a table is matched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for routing-key validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Table name is not in the watched set
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Operation name is not insert/update/delete
    #[error("Unknown change operation: {0}")]
    UnknownOperation(String),

    /// Event type string is not "<table>.<operation>"
    #[error("Invalid event type: {0}")]
    InvalidEventType(String),
}

// =============================================================================
// Table
// =============================================================================

/// A watched table in the chat schema.
///
/// Only the routing key is modeled here; row contents stay opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Chat channels
    Channels,
    /// Messages within channels
    Messages,
    /// Channel memberships
    Memberships,
    /// Emoji reactions on messages
    Reactions,
    /// Channel invites
    Invites,
    /// Typing indicators (high-frequency, freshness over completeness)
    Typing,
}

impl Table {
    /// All watched tables, in a stable order.
    pub const ALL: [Table; 6] = [
        Table::Channels,
        Table::Messages,
        Table::Memberships,
        Table::Reactions,
        Table::Invites,
        Table::Typing,
    ];

    /// Table name as it appears on the replication stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Channels => "channels",
            Table::Messages => "messages",
            Table::Memberships => "memberships",
            Table::Reactions => "reactions",
            Table::Invites => "invites",
            Table::Typing => "typing",
        }
    }

    /// Stable index into `Table::ALL`.
    pub fn index(&self) -> usize {
        match self {
            Table::Channels => 0,
            Table::Messages => 1,
            Table::Memberships => 2,
            Table::Reactions => 3,
            Table::Invites => 4,
            Table::Typing => 5,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channels" => Ok(Table::Channels),
            "messages" => Ok(Table::Messages),
            "memberships" => Ok(Table::Memberships),
            "reactions" => Ok(Table::Reactions),
            "invites" => Ok(Table::Invites),
            "typing" => Ok(Table::Typing),
            other => Err(DomainError::UnknownTable(other.to_string())),
        }
    }
}

// =============================================================================
// ChangeOp
// =============================================================================

/// Row-level change operation from the replication stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    /// Row inserted
    Insert,
    /// Row updated
    Update,
    /// Row deleted
    Delete,
}

impl ChangeOp {
    /// All operations, in a stable order.
    pub const ALL: [ChangeOp; 3] = [ChangeOp::Insert, ChangeOp::Update, ChangeOp::Delete];

    /// Operation name as used in event-type keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }

    /// Stable index into `ChangeOp::ALL`.
    pub fn index(&self) -> usize {
        match self {
            ChangeOp::Insert => 0,
            ChangeOp::Update => 1,
            ChangeOp::Delete => 2,
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeOp {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(ChangeOp::Insert),
            "update" => Ok(ChangeOp::Update),
            "delete" => Ok(ChangeOp::Delete),
            other => Err(DomainError::UnknownOperation(other.to_string())),
        }
    }
}

// =============================================================================
// EventType
// =============================================================================

/// Routing key for one kind of change: `"<table>.<operation>"`.
///
/// Events are queued and dispatched per event type; the set is closed, so
/// queue sets and handler registries can be fixed arrays indexed by
/// [`EventType::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType {
    /// Table the change belongs to
    pub table: Table,
    /// Change operation
    pub op: ChangeOp,
}

impl EventType {
    /// Number of distinct event types.
    pub const COUNT: usize = Table::ALL.len() * ChangeOp::ALL.len();

    /// Create an event type from its parts.
    pub fn new(table: Table, op: ChangeOp) -> Self {
        Self { table, op }
    }

    /// Iterate over every event type, in a stable order.
    pub fn all() -> impl Iterator<Item = EventType> {
        Table::ALL
            .into_iter()
            .flat_map(|table| ChangeOp::ALL.into_iter().map(move |op| EventType { table, op }))
    }

    /// Stable index in `0..EventType::COUNT`.
    pub fn index(&self) -> usize {
        self.table.index() * ChangeOp::ALL.len() + self.op.index()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.op)
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, op) = s
            .split_once('.')
            .ok_or_else(|| DomainError::InvalidEventType(s.to_string()))?;
        Ok(Self { table: table.parse()?, op: op.parse()? })
    }
}

// =============================================================================
// Tests
// =============================================================================
