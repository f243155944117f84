//! Handler registry: enum-indexed handler sets.

use std::sync::{Arc, RwLock};

use wakeline_domain::EventType;

use crate::handler::EventHandler;

/// Handlers keyed by event type.
///
/// Registration may happen from any task, before or after the dispatcher
/// starts; consumer loops snapshot the set fresh on every dispatch, so a
/// late registration takes effect from the next event on (no replay).
/// Set semantics: registering the same handler instance twice is a no-op.
pub struct HandlerRegistry {
    handlers: RwLock<[Vec<Arc<dyn EventHandler>>; EventType::COUNT]>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { handlers: RwLock::new(std::array::from_fn(|_| Vec::new())) }
    }

    /// Register a handler for an event type.
    ///
    /// Returns `false` if this exact instance was already registered for
    /// the type (identity by `Arc::ptr_eq`).
    pub fn register(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> bool {
        let mut handlers = self.handlers.write().expect("registry lock poisoned");
        let set = &mut handlers[event_type.index()];

        if set.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            return false;
        }
        set.push(handler);
        true
    }

    /// Snapshot the handlers currently registered for an event type.
    pub fn handlers_for(&self, event_type: EventType) -> Vec<Arc<dyn EventHandler>> {
        self.handlers.read().expect("registry lock poisoned")[event_type.index()].clone()
    }

    /// Number of handlers registered for an event type.
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers.read().expect("registry lock poisoned")[event_type.index()].len()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
