//! Stream coordinates: positions and transaction markers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event_type::Table;

// =============================================================================
// StreamPosition
// =============================================================================

/// A point in the replicated change stream.
///
/// Positions are totally ordered per table; the transport guarantees that
/// messages for one table arrive in non-decreasing position order. No
/// ordering is implied across tables.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StreamPosition(u64);

impl StreamPosition {
    /// The position before any delivered change.
    pub const START: StreamPosition = StreamPosition(0);

    /// Create a position from a raw stream offset.
    pub fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// The raw stream offset.
    pub fn offset(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TransactionMarker
// =============================================================================

/// Token returned by the authoritative write operation.
///
/// A marker promises that the write will appear on the replicated stream for
/// its table at-or-before the carried position. A speculative mutation is
/// confirmed once the latest delivered position for that table reaches the
/// marker; until then the true outcome is unobserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMarker {
    table: Table,
    position: StreamPosition,
}

impl TransactionMarker {
    /// Create a marker for a write against `table` visible at-or-before
    /// `position`.
    pub fn new(table: Table, position: StreamPosition) -> Self {
        Self { table, position }
    }

    /// Table the marked write belongs to.
    pub fn table(&self) -> Table {
        self.table
    }

    /// Stream position the write is visible at-or-before.
    pub fn position(&self) -> StreamPosition {
        self.position
    }

    /// Whether a delivered stream position proves the write is visible.
    pub fn is_covered_by(&self, observed: StreamPosition) -> bool {
        observed >= self.position
    }
}

impl fmt::Display for TransactionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.table, self.position)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        assert!(StreamPosition::new(1) > StreamPosition::START);
        assert!(StreamPosition::new(41) < StreamPosition::new(42));
        assert_eq!(StreamPosition::default(), StreamPosition::START);
    }

    #[test]
    fn test_marker_coverage() {
        let marker = TransactionMarker::new(Table::Messages, StreamPosition::new(10));

        assert!(!marker.is_covered_by(StreamPosition::new(9)));
        assert!(marker.is_covered_by(StreamPosition::new(10)));
        assert!(marker.is_covered_by(StreamPosition::new(11)));
    }

    #[test]
    fn test_marker_display() {
        let marker = TransactionMarker::new(Table::Typing, StreamPosition::new(7));
        assert_eq!(marker.to_string(), "typing@7");
    }
}
