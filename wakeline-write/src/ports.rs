//! Authoritative write port.
//!
//! The write operation is an external collaborator (an RPC against the
//! server that owns the durable store). The coordinator depends only on
//! this contract; the in-crate [`crate::stub::StubWriter`] exists for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wakeline_domain::{Table, TransactionMarker};

/// A mutation sent to the authoritative write operation.
///
/// The payload is opaque to this layer; the server validates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Table the mutation targets
    pub table: Table,
    /// Opaque mutation payload
    pub payload: serde_json::Value,
}

impl WriteRequest {
    /// Create a write request.
    pub fn new(table: Table, payload: serde_json::Value) -> Self {
        Self { table, payload }
    }
}

/// Errors from the authoritative write operation.
///
/// All of these are definite: the write did not apply, and the caller's
/// speculative patch is rolled back synchronously.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// The server rejected the mutation (validation).
    #[error("Write rejected: {0}")]
    Rejected(String),

    /// The caller is not allowed to perform this mutation.
    #[error("Write unauthorized: {0}")]
    Unauthorized(String),

    /// The mutation conflicted with concurrent server state.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// The write RPC could not be completed.
    #[error("Write transport failure: {0}")]
    Network(String),
}

/// Port for the authoritative write operation.
#[async_trait]
pub trait WritePort: Send + Sync {
    /// Submit a mutation.
    ///
    /// On success, returns the transaction marker correlating the write
    /// with its eventual visibility on the replicated stream.
    async fn write(&self, request: WriteRequest) -> Result<TransactionMarker, WriteError>;
}
