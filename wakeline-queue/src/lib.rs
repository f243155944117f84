//! Wakeline Change Queue
//!
//! Per-event-type bounded buffers between the stream subscriber (producer)
//! and the dispatcher consumer loops. Overflow is a policy decision, not an
//! error: producers never block, drops are counted, and queue length never
//! exceeds capacity.

#![warn(clippy::all)]

pub mod queue;
pub mod set;

pub use queue::{ChangeQueue, OverflowPolicy};
pub use set::QueueSet;
