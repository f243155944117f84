//! Speculative mutation state machine.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use wakeline_domain::TransactionMarker;

/// Lifecycle of a speculative mutation.
///
/// `Pending` is the only non-terminal state and is never observable by the
/// caller once the coordinator returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Applied locally, outcome not yet known
    Pending,
    /// Marker observed on the stream; local patch retained
    Confirmed,
    /// Write rejected, timed out or cancelled; local patch reverted
    RolledBack,
}

/// One optimistic mutation tracked by the coordinator.
#[derive(Debug, Clone)]
pub struct SpeculativeMutation {
    /// Unique mutation id (time-ordered)
    pub id: Uuid,
    /// Marker returned by the write, once issued
    pub marker: Option<TransactionMarker>,
    /// Current lifecycle state
    pub state: MutationState,
    /// When the local patch was applied
    pub created_at: DateTime<Utc>,
    /// When the mutation reached a terminal state
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SpeculativeMutation {
    /// Create a pending mutation.
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            marker: None,
            state: MutationState::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Whether the mutation has reached a terminal state.
    pub fn is_resolved(&self) -> bool {
        self.state != MutationState::Pending
    }

    /// Record the marker returned by the write operation.
    pub fn mark_written(&mut self, marker: TransactionMarker) {
        debug_assert_eq!(self.state, MutationState::Pending);
        self.marker = Some(marker);
    }

    /// Transition to Confirmed. Terminal.
    pub fn confirm(&mut self) {
        debug_assert_eq!(self.state, MutationState::Pending);
        self.state = MutationState::Confirmed;
        self.resolved_at = Some(Utc::now());
    }

    /// Transition to RolledBack. Terminal.
    pub fn roll_back(&mut self) {
        debug_assert_eq!(self.state, MutationState::Pending);
        self.state = MutationState::RolledBack;
        self.resolved_at = Some(Utc::now());
    }
}

impl Default for SpeculativeMutation {
    fn default() -> Self {
        Self::new()
    }
}
