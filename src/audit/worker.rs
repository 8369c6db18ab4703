//! Channel-backed audit dispatch.
//!
//! [`ChannelAuditSink`] hands events to a bounded queue without waiting; a
//! dedicated task drains the queue into an [`AuditRepository`]. Audit
//! latency therefore never adds to request latency.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use super::{AuditEvent, AuditRecord, AuditRepository, AuditSink};
use crate::clock::Clock;
use crate::error::AuditError;

/// Sending half of the audit queue.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => AuditError::QueueFull,
            TrySendError::Closed(_) => AuditError::Closed,
        })
    }
}

/// Spawns the audit writer task.
///
/// The task runs until every [`ChannelAuditSink`] clone has been dropped and
/// the queue is drained. Must be called from within a Tokio runtime.
pub fn spawn_audit_worker(
    repository: Arc<dyn AuditRepository>,
    capacity: usize,
    clock: Arc<dyn Clock>,
) -> (ChannelAuditSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<AuditEvent>(capacity.max(1));

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let record = AuditRecord::from_event(&event, Uuid::new_v4(), clock.now());
            let record_id = record.id;
            let workspace_id = record.workspace_id.clone();
            match repository.append(record).await {
                Ok(()) => debug!(%record_id, %workspace_id, "Persisted audit record"),
                Err(e) => {
                    error!(%record_id, %workspace_id, error = %e, "Failed to persist audit record")
                }
            }
        }
        debug!("Audit queue closed");
    });

    (ChannelAuditSink { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditKind, MemoryAuditRepository};
    use crate::clock::SystemClock;
    use crate::models::OverrideAuditEvent;
    use chrono::Utc;

    fn event(workspace_id: &str) -> AuditEvent {
        AuditEvent::OverrideApplied(OverrideAuditEvent {
            workspace_id: workspace_id.into(),
            campaign_id: None,
            override_id: None,
            provider_call_id: "pc".into(),
            from: "+1".into(),
            to: "+2".into(),
            client_ip: None,
            actor_user_id: None,
            connect_to: "sip:x".into(),
            applied_at: Utc::now(),
            expires_at: Utc::now(),
            metadata: None,
        })
    }

    #[tokio::test]
    async fn drains_queue_into_repository() {
        let repo = Arc::new(MemoryAuditRepository::new());
        let (sink, handle) = spawn_audit_worker(repo.clone(), 8, Arc::new(SystemClock));

        sink.record(event("w")).unwrap();
        sink.record(event("w")).unwrap();
        drop(sink);
        handle.await.unwrap();

        let records = repo.records("w").await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == AuditKind::RoutingOverride));
    }

    #[tokio::test]
    async fn repository_failures_do_not_stop_worker() {
        let repo = Arc::new(MemoryAuditRepository::new());
        let (sink, handle) = spawn_audit_worker(repo.clone(), 8, Arc::new(SystemClock));

        sink.record(event("")).unwrap();
        sink.record(event("w")).unwrap();
        drop(sink);
        handle.await.unwrap();

        assert_eq!(repo.records("w").await.len(), 1);
    }

    /// Fails the first append, then delegates.
    struct FlakyRepository {
        failed: std::sync::atomic::AtomicBool,
        inner: MemoryAuditRepository,
    }

    #[async_trait::async_trait]
    impl AuditRepository for FlakyRepository {
        async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(AuditError::Repository("connection reset".into()));
            }
            self.inner.append(record).await
        }
    }

    #[tokio::test]
    async fn worker_survives_repository_outage() {
        let repo = Arc::new(FlakyRepository {
            failed: Default::default(),
            inner: MemoryAuditRepository::new(),
        });
        let (sink, handle) = spawn_audit_worker(repo.clone(), 8, Arc::new(SystemClock));

        sink.record(event("w")).unwrap();
        sink.record(event("w")).unwrap();
        drop(sink);
        handle.await.unwrap();

        assert_eq!(repo.inner.records("w").await.len(), 1);
    }

    #[tokio::test]
    async fn full_queue_is_reported() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = ChannelAuditSink { tx };
        sink.record(event("w")).unwrap();
        assert!(matches!(sink.record(event("w")), Err(AuditError::QueueFull)));
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelAuditSink { tx };
        assert!(matches!(sink.record(event("w")), Err(AuditError::Closed)));
    }
}
