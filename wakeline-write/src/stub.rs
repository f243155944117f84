//! Stub write port for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use wakeline_domain::{StreamPosition, Table, TransactionMarker};

use crate::ports::{WriteError, WritePort, WriteRequest};

/// In-memory write port.
///
/// Returns a configured marker per write, or a configured failure for the
/// next call, and remembers the requests it accepted.
pub struct StubWriter {
    next_marker: Mutex<Option<TransactionMarker>>,
    fail_next: Mutex<Option<WriteError>>,
    accepted: Mutex<Vec<WriteRequest>>,
}

impl StubWriter {
    /// Create a stub writer with no configured marker.
    pub fn new() -> Self {
        Self {
            next_marker: Mutex::new(None),
            fail_next: Mutex::new(None),
            accepted: Mutex::new(Vec::new()),
        }
    }

    /// Configure the marker returned by subsequent writes.
    pub fn set_next_marker(&self, table: Table, position: StreamPosition) {
        *self.next_marker.lock().unwrap() = Some(TransactionMarker::new(table, position));
    }

    /// Make the next write fail.
    pub fn fail_next(&self, error: WriteError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Requests accepted so far.
    pub fn accepted_count(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }
}

impl Default for StubWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WritePort for StubWriter {
    async fn write(&self, request: WriteRequest) -> Result<TransactionMarker, WriteError> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }

        // Default marker: position 1 on the request's table.
        let marker = self
            .next_marker
            .lock()
            .unwrap()
            .unwrap_or_else(|| TransactionMarker::new(request.table, StreamPosition::new(1)));

        self.accepted.lock().unwrap().push(request);
        Ok(marker)
    }
}

// =============================================================================
// Tests
// =============================================================================
