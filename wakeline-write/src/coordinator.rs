//! Mutation coordinator: apply locally, write, await the marker.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wakeline_domain::{StreamPosition, TransactionMarker};
use wakeline_stream::PositionIndex;

use crate::error::{MutationError, MutationResult};
use crate::mutation::SpeculativeMutation;
use crate::ports::{WritePort, WriteRequest};
use crate::projection::{LocalPatch, LocalProjection};

/// Proof of a confirmed mutation.
#[derive(Debug, Clone)]
pub struct MutationReceipt {
    /// The mutation's id
    pub id: Uuid,
    /// Marker returned by the write operation
    pub marker: TransactionMarker,
    /// Stream position at which the marker was observed
    pub observed_position: StreamPosition,
    /// When the mutation was confirmed
    pub confirmed_at: DateTime<Utc>,
}

/// Coordinates optimistic mutations against the authoritative write port.
///
/// A mutation is only reported confirmed once its transaction marker is
/// observably covered by the replicated stream, which gives subsequent
/// stream-sourced reads read-after-write consistency. Resolving on the
/// write RPC alone would let readers see state the stream has not caught
/// up to.
pub struct MutationCoordinator<W: WritePort> {
    writer: Arc<W>,
    projection: Arc<LocalProjection>,
    positions: Arc<PositionIndex>,
    confirm_timeout: Duration,
}

impl<W: WritePort> MutationCoordinator<W> {
    /// Create a coordinator.
    ///
    /// `positions` must be the index fed by the stream subscriber watching
    /// the same transport the markers refer to.
    pub fn new(
        writer: Arc<W>,
        projection: Arc<LocalProjection>,
        positions: Arc<PositionIndex>,
        confirm_timeout: Duration,
    ) -> Self {
        Self { writer, projection, positions, confirm_timeout }
    }

    /// The shared local projection.
    pub fn projection(&self) -> &Arc<LocalProjection> {
        &self.projection
    }

    /// Apply `patch` speculatively, submit `request`, and wait for the
    /// returned marker on the stream.
    ///
    /// Exactly one outcome is reported: a receipt (patch retained), a
    /// definite write rejection, an ambiguous timeout, or cancellation;
    /// the patch is reverted in every non-receipt case before returning.
    pub async fn mutate(
        &self,
        patch: LocalPatch,
        request: WriteRequest,
        cancel: &CancellationToken,
    ) -> MutationResult<MutationReceipt> {
        // Cancellation observed before the write is issued is the only
        // definite form: nothing was applied and nothing was sent.
        if cancel.is_cancelled() {
            return Err(MutationError::Cancelled { marker: None, write_issued: false });
        }

        let mut mutation = SpeculativeMutation::new();

        let undo = self.projection.apply(&patch);
        debug!(
            mutation_id = %mutation.id,
            table = %patch.table,
            row_id = %patch.row_id,
            "Applied speculative patch"
        );

        // Issue the authoritative write, racing caller cancellation.
        let marker = tokio::select! {
            _ = cancel.cancelled() => {
                mutation.roll_back();
                self.projection.revert(undo);
                // The write future was already polled; the request may have
                // reached the server before it was dropped.
                warn!(mutation_id = %mutation.id, "Mutation cancelled mid-write; outcome unknown");
                return Err(MutationError::Cancelled { marker: None, write_issued: true });
            }
            written = self.writer.write(request) => match written {
                Ok(marker) => marker,
                Err(cause) => {
                    mutation.roll_back();
                    self.projection.revert(undo);
                    info!(
                        mutation_id = %mutation.id,
                        error = %cause,
                        "Write rejected, speculative patch reverted"
                    );
                    return Err(MutationError::Write(cause));
                }
            }
        };
        mutation.mark_written(marker);

        // The write is committed server-side; wait for it to surface on
        // the replicated stream.
        tokio::select! {
            _ = cancel.cancelled() => {
                mutation.roll_back();
                self.projection.revert(undo);
                warn!(
                    mutation_id = %mutation.id,
                    %marker,
                    "Mutation cancelled while awaiting marker; outcome unknown"
                );
                Err(MutationError::Cancelled { marker: Some(marker), write_issued: true })
            }
            observed = self.positions.wait_for(&marker, self.confirm_timeout) => {
                match observed {
                    Ok(observed_position) => {
                        mutation.confirm();
                        debug!(
                            mutation_id = %mutation.id,
                            %marker,
                            %observed_position,
                            "Mutation confirmed"
                        );
                        Ok(MutationReceipt {
                            id: mutation.id,
                            marker,
                            observed_position,
                            confirmed_at: mutation.resolved_at.unwrap_or_else(Utc::now),
                        })
                    }
                    Err(_) => {
                        mutation.roll_back();
                        self.projection.revert(undo);
                        warn!(
                            mutation_id = %mutation.id,
                            %marker,
                            timeout_ms = self.confirm_timeout.as_millis() as u64,
                            "Marker not observed in time; outcome ambiguous, patch reverted"
                        );
                        Err(MutationError::Ambiguous {
                            marker,
                            timeout_ms: self.confirm_timeout.as_millis() as u64,
                        })
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::WriteError;
    use crate::stub::StubWriter;
    use serde_json::json;
    use wakeline_domain::Table;

    fn coordinator(
        writer: Arc<StubWriter>,
        confirm_timeout: Duration,
    ) -> (MutationCoordinator<StubWriter>, Arc<LocalProjection>, Arc<PositionIndex>) {
        let projection = Arc::new(LocalProjection::new());
        let positions = Arc::new(PositionIndex::new());
        let coordinator = MutationCoordinator::new(
            writer,
            projection.clone(),
            positions.clone(),
            confirm_timeout,
        );
        (coordinator, projection, positions)
    }

    fn message_patch() -> LocalPatch {
        LocalPatch::put(Table::Messages, "m1", json!({"body": "hello"}))
    }

    fn message_request() -> WriteRequest {
        WriteRequest::new(Table::Messages, json!({"insert": {"id": "m1", "body": "hello"}}))
    }

    #[tokio::test]
    async fn test_confirm_when_marker_already_observed() {
        let writer = Arc::new(StubWriter::new());
        writer.set_next_marker(Table::Messages, StreamPosition::new(5));

        let (coordinator, projection, positions) =
            coordinator(writer, Duration::from_millis(200));
        positions.record(Table::Messages, StreamPosition::new(5));

        let receipt = coordinator
            .mutate(message_patch(), message_request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(receipt.observed_position, StreamPosition::new(5));
        // Patch retained on confirmation.
        assert_eq!(projection.get(Table::Messages, "m1").unwrap()["body"], "hello");
    }

    #[tokio::test]
    async fn test_confirm_when_marker_arrives_during_wait() {
        let writer = Arc::new(StubWriter::new());
        writer.set_next_marker(Table::Messages, StreamPosition::new(10));

        let (coordinator, projection, positions) = coordinator(writer, Duration::from_secs(5));

        let waiter = tokio::spawn({
            let positions = positions.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                positions.record(Table::Messages, StreamPosition::new(12));
            }
        });

        let receipt = coordinator
            .mutate(message_patch(), message_request(), &CancellationToken::new())
            .await
            .unwrap();
        waiter.await.unwrap();

        assert_eq!(receipt.observed_position, StreamPosition::new(12));
        assert!(projection.get(Table::Messages, "m1").is_some());
    }

    #[tokio::test]
    async fn test_write_failure_rolls_back_synchronously() {
        let writer = Arc::new(StubWriter::new());
        writer.fail_next(WriteError::Rejected("body too long".to_string()));

        let (coordinator, projection, _) = coordinator(writer, Duration::from_secs(5));

        let err = coordinator
            .mutate(message_patch(), message_request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MutationError::Write(WriteError::Rejected(_))));
        assert!(err.is_definite());
        // Patch reverted without waiting on the stream.
        assert!(projection.get(Table::Messages, "m1").is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_ambiguous_and_reverts() {
        let writer = Arc::new(StubWriter::new());
        writer.set_next_marker(Table::Messages, StreamPosition::new(100));

        // Marker never observed.
        let (coordinator, projection, _) = coordinator(writer, Duration::from_millis(20));

        let err = coordinator
            .mutate(message_patch(), message_request(), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            MutationError::Ambiguous { marker, .. } => {
                assert_eq!(marker.position(), StreamPosition::new(100));
            }
            other => panic!("Expected Ambiguous, got {other}"),
        }
        assert!(!err.is_definite());
        assert!(projection.get(Table::Messages, "m1").is_none());
    }

    #[tokio::test]
    async fn test_cancellation_during_wait_reverts() {
        let writer = Arc::new(StubWriter::new());
        writer.set_next_marker(Table::Messages, StreamPosition::new(100));

        let (coordinator, projection, _) = coordinator(writer, Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let canceller = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cancel.cancel();
            }
        });

        let err =
            coordinator.mutate(message_patch(), message_request(), &cancel).await.unwrap_err();
        canceller.await.unwrap();

        match &err {
            MutationError::Cancelled { marker, write_issued } => {
                assert!(marker.is_some());
                assert!(*write_issued);
            }
            other => panic!("Expected Cancelled, got {other}"),
        }
        assert!(!err.is_definite());
        assert!(projection.get(Table::Messages, "m1").is_none());
    }

    #[tokio::test]
    async fn test_cancellation_before_write_is_definite() {
        let writer = Arc::new(StubWriter::new());
        let (coordinator, projection, _) = coordinator(writer.clone(), Duration::from_secs(5));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = coordinator
            .mutate(message_patch(), message_request(), &cancel)
            .await
            .unwrap_err();

        match &err {
            MutationError::Cancelled { marker, write_issued } => {
                assert!(marker.is_none());
                assert!(!*write_issued);
            }
            other => panic!("Expected Cancelled, got {other}"),
        }
        // Nothing was sent, so this is the one cancellation that proves
        // the write did not apply.
        assert!(err.is_definite());
        assert_eq!(writer.accepted_count(), 0);
        assert!(projection.get(Table::Messages, "m1").is_none());
    }

    /// Writer that counts arrivals and never completes until released.
    struct StallingWriter {
        received: std::sync::atomic::AtomicU32,
        release: tokio::sync::Semaphore,
    }

    #[async_trait::async_trait]
    impl WritePort for StallingWriter {
        async fn write(&self, request: WriteRequest) -> Result<TransactionMarker, WriteError> {
            self.received.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|_| WriteError::Network("writer shut down".to_string()))?;
            Ok(TransactionMarker::new(request.table, StreamPosition::new(1)))
        }
    }

    #[tokio::test]
    async fn test_cancellation_mid_write_is_indefinite() {
        let writer = Arc::new(StallingWriter {
            received: std::sync::atomic::AtomicU32::new(0),
            release: tokio::sync::Semaphore::new(0),
        });
        let projection = Arc::new(LocalProjection::new());
        let positions = Arc::new(PositionIndex::new());
        let coordinator = MutationCoordinator::new(
            writer.clone(),
            projection.clone(),
            positions,
            Duration::from_secs(5),
        );

        let cancel = CancellationToken::new();
        let fut = coordinator.mutate(message_patch(), message_request(), &cancel);
        tokio::pin!(fut);

        // Drive the mutation into the write call, then cancel: the request
        // has reached the writer but no marker will ever come back.
        tokio::select! {
            biased;
            _ = &mut fut => panic!("mutation resolved while the writer was stalled"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        assert_eq!(writer.received.load(std::sync::atomic::Ordering::SeqCst), 1);
        cancel.cancel();

        let err = fut.await.unwrap_err();
        match &err {
            MutationError::Cancelled { marker, write_issued } => {
                assert!(marker.is_none());
                assert!(*write_issued);
            }
            other => panic!("Expected Cancelled, got {other}"),
        }
        assert!(!err.is_definite());
        assert!(projection.get(Table::Messages, "m1").is_none());
    }

    #[tokio::test]
    async fn test_speculative_patch_visible_before_confirmation() {
        let writer = Arc::new(StubWriter::new());
        writer.set_next_marker(Table::Messages, StreamPosition::new(1));

        let (coordinator, projection, positions) = coordinator(writer, Duration::from_secs(5));

        let mutate = {
            let cancel = CancellationToken::new();
            let fut = coordinator.mutate(message_patch(), message_request(), &cancel);
            tokio::pin!(fut);

            // Drive the mutation until it parks on the marker wait.
            tokio::select! {
                biased;
                _ = &mut fut => panic!("mutation resolved without the marker"),
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            }

            // Pending state: the patch is already visible to readers.
            assert_eq!(projection.get(Table::Messages, "m1").unwrap()["body"], "hello");

            positions.record(Table::Messages, StreamPosition::new(1));
            fut.await
        };

        mutate.unwrap();
    }
}
