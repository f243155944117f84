//! Consumer-facing handler contract.

use async_trait::async_trait;
use thiserror::Error;

use wakeline_domain::ChangeEvent;

/// Errors a handler may return.
///
/// Any error triggers the dispatcher's retry policy; after retries are
/// exhausted the failure is logged and the event is abandoned for that
/// handler only.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler rejected or failed to process the event.
    #[error("Handler failed: {0}")]
    Failed(String),

    /// A dependency of the handler was unavailable (worth retrying).
    #[error("Handler dependency unavailable: {0}")]
    Unavailable(String),

    /// Any other handler-side failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A registered consumer of change events.
///
/// Delivery is at-least-once with no deduplication, so implementations must
/// be idempotent. Handlers for the same event run concurrently; a handler
/// must not rely on seeing events of other types in any order.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in failure logs.
    fn name(&self) -> &str;

    /// Process one event.
    async fn handle(&self, event: &ChangeEvent) -> Result<(), HandlerError>;
}
