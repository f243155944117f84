//! Optimistic write error types.

use thiserror::Error;

use wakeline_domain::TransactionMarker;

use crate::ports::WriteError;

/// Errors reported to the mutation caller.
///
/// Exactly one outcome is reported per mutation; the local patch has been
/// reverted in every error case by the time the coordinator returns.
#[derive(Debug, Error)]
pub enum MutationError {
    /// The authoritative write failed. Definite: the write did not apply.
    #[error("Mutation rejected: {0}")]
    Write(#[from] WriteError),

    /// The write succeeded but its marker was not observed on the stream
    /// within the confirm timeout. The true outcome is unknown: the write
    /// may still apply server-side. Callers must not treat this as a
    /// guaranteed failure.
    #[error("Mutation outcome ambiguous: marker {marker} not observed within {timeout_ms}ms")]
    Ambiguous {
        /// The unobserved marker
        marker: TransactionMarker,
        /// The confirm timeout that elapsed
        timeout_ms: u64,
    },

    /// The caller cancelled the mutation. Once the write request has been
    /// started it may have reached the server even if no marker came back,
    /// so only cancellation observed before the write was issued proves
    /// anything; every later cancellation is as unknown as a timeout.
    #[error("Mutation cancelled by caller")]
    Cancelled {
        /// Marker if the write had completed before cancellation
        marker: Option<TransactionMarker>,
        /// Whether the write request had been started
        write_issued: bool,
    },
}

impl MutationError {
    /// Whether the error proves the write did not apply.
    ///
    /// `false` means the outcome is unknown and the caller must reconcile
    /// via a later read of the stream.
    pub fn is_definite(&self) -> bool {
        match self {
            MutationError::Write(_) => true,
            MutationError::Ambiguous { .. } => false,
            MutationError::Cancelled { write_issued, .. } => !*write_issued,
        }
    }
}

/// Result type for mutation operations.
pub type MutationResult<T> = Result<T, MutationError>;
