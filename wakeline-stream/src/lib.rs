//! Wakeline Stream Subscriber
//!
//! Bridges the change-stream transport into the change queues. One task per
//! watched table: subscribe, normalize raw messages into typed events, offer
//! them downstream, and keep the per-table position watch current so the
//! write coordinator can await visibility.
//!
//! The transport itself is a port; this crate only consumes it.

#![warn(clippy::all)]

pub mod position_watch;
pub mod stub;
pub mod subscriber;
pub mod transport;

pub use position_watch::{PositionIndex, PositionWaitError};
pub use stub::StubTransport;
pub use subscriber::{StreamError, StreamSubscriber};
pub use transport::{ChangeMessage, ChangeStreamTransport, ControlMessage, TransportError};
