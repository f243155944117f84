//! Pipeline-level error types.

use thiserror::Error;

use wakeline_stream::{StreamError, TransportError};

/// Pipeline-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport error while opening subscriptions
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A subscription task failed
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pipeline was started twice
    #[error("Pipeline already started")]
    AlreadyStarted,
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
