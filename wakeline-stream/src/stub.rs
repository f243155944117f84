//! Stub transport for tests.
//!
//! Simulates the change-stream transport without any network: tests emit
//! messages per table and the stub delivers them to whoever subscribed.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wakeline_domain::{ChangeOp, StreamPosition, SubscriptionConfig, Table};

use crate::transport::{ChangeMessage, ChangeStreamTransport, ControlMessage, TransportError};

/// Buffered channel size for stub subscriptions; large enough that tests
/// can pre-load events before any consumer runs.
const STUB_CHANNEL_CAPACITY: usize = 64;

/// In-memory change-stream transport.
pub struct StubTransport {
    senders: Mutex<HashMap<Table, mpsc::Sender<ChangeMessage>>>,
    fail_next: Mutex<Option<String>>,
}

impl StubTransport {
    /// Create a stub with no open subscriptions.
    pub fn new() -> Self {
        Self { senders: Mutex::new(HashMap::new()), fail_next: Mutex::new(None) }
    }

    /// Make the next `subscribe` call fail with the given reason.
    pub fn fail_next_subscribe(&self, reason: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(reason.into());
    }

    /// Emit a row change on a table's subscription.
    ///
    /// Panics if nothing subscribed to the table; tests subscribe first.
    pub async fn emit(
        &self,
        table: Table,
        op: ChangeOp,
        row: serde_json::Value,
        position: StreamPosition,
    ) {
        self.send(table, ChangeMessage::Change { op, row, position }).await;
    }

    /// Emit a control message on a table's subscription.
    pub async fn emit_control(&self, table: Table, control: ControlMessage) {
        self.send(table, ChangeMessage::Control(control)).await;
    }

    /// Drop a table's subscription, simulating a disconnect.
    pub async fn disconnect(&self, table: Table) {
        self.senders.lock().unwrap().remove(&table);
    }

    /// Whether a table currently has an open subscription.
    pub fn is_subscribed(&self, table: Table) -> bool {
        self.senders.lock().unwrap().contains_key(&table)
    }

    async fn send(&self, table: Table, message: ChangeMessage) {
        let sender = self
            .senders
            .lock()
            .unwrap()
            .get(&table)
            .cloned()
            .unwrap_or_else(|| panic!("no subscription for table {table}"));

        sender.send(message).await.expect("stub subscription receiver dropped");
    }
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeStreamTransport for StubTransport {
    async fn subscribe(
        &self,
        config: &SubscriptionConfig,
    ) -> Result<mpsc::Receiver<ChangeMessage>, TransportError> {
        if let Some(reason) = self.fail_next.lock().unwrap().take() {
            return Err(TransportError::ConnectionFailed(reason));
        }

        let (sender, receiver) = mpsc::channel(STUB_CHANNEL_CAPACITY);
        self.senders.lock().unwrap().insert(config.table, sender);
        Ok(receiver)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_and_emit() {
        let transport = StubTransport::new();
        let mut receiver =
            transport.subscribe(&SubscriptionConfig::new(Table::Messages)).await.unwrap();

        transport
            .emit(Table::Messages, ChangeOp::Insert, json!({"id": "m1"}), StreamPosition::new(1))
            .await;

        match receiver.recv().await.unwrap() {
            ChangeMessage::Change { op, position, .. } => {
                assert_eq!(op, ChangeOp::Insert);
                assert_eq!(position, StreamPosition::new(1));
            }
            other => panic!("Expected Change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_closes_channel() {
        let transport = StubTransport::new();
        let mut receiver =
            transport.subscribe(&SubscriptionConfig::new(Table::Typing)).await.unwrap();

        transport.disconnect(Table::Typing).await;
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_next_subscribe() {
        let transport = StubTransport::new();
        transport.fail_next_subscribe("boom");

        let err =
            transport.subscribe(&SubscriptionConfig::new(Table::Channels)).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));

        // Only the next call fails.
        assert!(transport.subscribe(&SubscriptionConfig::new(Table::Channels)).await.is_ok());
    }
}
