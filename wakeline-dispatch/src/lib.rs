//! Wakeline Event Dispatcher
//!
//! Owns the handler registry and runs one consumer loop per event type.
//! Each consumed event fans out to every registered handler concurrently,
//! each invocation independently retried with bounded exponential backoff.
//! A permanently failing handler is logged and abandoned; it never blocks
//! other handlers or the next event. Delivery is at-least-once; handlers
//! must be idempotent.

#![warn(clippy::all)]

pub mod dispatcher;
pub mod handler;
pub mod registry;
pub mod retry;

pub use dispatcher::Dispatcher;
pub use handler::{EventHandler, HandlerError};
pub use registry::HandlerRegistry;
pub use retry::{invoke_with_retry, RetryPolicy};
