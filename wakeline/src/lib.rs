//! Wakeline
//!
//! Change-data-capture event pipeline with an optimistic-write consistency
//! layer, for clients that project a chat backend's tables locally.
//!
//! # Architecture
//!
//! ```text
//!   transport ──▶ StreamSubscriber ──▶ ChangeQueue (per event type)
//!                       │                      │
//!                       ▼                      ▼
//!                 PositionIndex          Dispatcher ──▶ EventHandler
//!                       ▲
//!                       │ wait_for(marker)
//!               MutationCoordinator ──▶ WritePort
//! ```
//!
//! The subscriber fans incoming row changes out to bounded per-type queues
//! and records each table's delivered position. The dispatcher consumes the
//! queues and invokes registered handlers with retry. The mutation
//! coordinator applies a local patch speculatively, submits the write, and
//! confirms it by waiting for the write's transaction marker to appear on
//! the same stream the subscriber is reading.
//!
//! # Environment Variables
//!
//! - `WAKELINE_QUEUE_CAPACITY`: per-type queue capacity (default: 256)
//! - `WAKELINE_QUEUE_POLICY`: overflow policy, `drop_oldest`, `drop_newest`
//!   or `sliding` (default: sliding)
//! - `WAKELINE_MAX_RETRIES`: handler retries after the first attempt
//!   (default: 3)
//! - `WAKELINE_RETRY_BASE_DELAY_MS`: backoff base delay (default: 100)
//! - `WAKELINE_CONFIRM_TIMEOUT_MS`: write confirmation window
//!   (default: 5000)
//! - `WAKELINE_SHUTDOWN_GRACE_MS`: drain grace period (default: 2000)

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{Config, QueueConfig, QueueOverride};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::Pipeline;

// Re-export the component crates' public surface so binaries only need
// the facade.
pub use wakeline_dispatch::{Dispatcher, EventHandler, HandlerError, HandlerRegistry, RetryPolicy};
pub use wakeline_domain::{
    ChangeEvent, ChangeOp, DomainError, EventType, StartPosition, StreamPosition,
    SubscriptionConfig, Table, TransactionMarker,
};
pub use wakeline_queue::{ChangeQueue, OverflowPolicy, QueueSet};
pub use wakeline_stream::{
    ChangeMessage, ChangeStreamTransport, ControlMessage, PositionIndex, StreamError,
    StreamSubscriber, StubTransport, TransportError,
};
pub use wakeline_write::{
    LocalPatch, LocalProjection, MutationCoordinator, MutationError, MutationReceipt,
    MutationResult, StubWriter, WriteError, WritePort, WriteRequest,
};
