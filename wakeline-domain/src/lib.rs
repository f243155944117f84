//! Wakeline Domain Layer
//!
//! Pure types for the change-data-capture pipeline with zero I/O dependencies.
//! Row payloads are opaque JSON; these types only describe how changes are
//! routed, ordered and correlated.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod change;
pub mod event_type;
pub mod position;
pub mod subscription;

// Re-export commonly used types
pub use change::ChangeEvent;
pub use event_type::{ChangeOp, DomainError, EventType, Table};
pub use position::{StreamPosition, TransactionMarker};
pub use subscription::{StartPosition, SubscriptionConfig};
