//! Wakeline Optimistic Write Layer
//!
//! Applies a mutation to the local in-memory projection before the server
//! confirms it, issues the authoritative write, then waits for the returned
//! transaction marker to be observed on the replicated stream. Only then is
//! the mutation confirmed; a rejected write or an unobserved marker rolls
//! the local patch back.
//!
//! # Flow
//!
//! ```text
//! caller → apply patch → WritePort → marker → PositionIndex wait → Confirmed
//!             │              │                        │
//!             │              └ WriteError ────────────┼──→ RolledBack (definite)
//!             └──────────────────────── timeout/cancel┴──→ RolledBack (ambiguous)
//! ```

#![warn(clippy::all)]

pub mod coordinator;
pub mod error;
pub mod mutation;
pub mod ports;
pub mod projection;
pub mod stub;

pub use coordinator::{MutationCoordinator, MutationReceipt};
pub use error::{MutationError, MutationResult};
pub use mutation::{MutationState, SpeculativeMutation};
pub use ports::{WriteError, WritePort, WriteRequest};
pub use projection::{LocalPatch, LocalProjection, PatchOp, UndoPatch};
pub use stub::StubWriter;
