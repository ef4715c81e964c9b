use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::models::audit::AuditEvent;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink rejected event: {0}")]
    Rejected(String),
}

/// Best-effort audit log. Failures never undo the mutation being audited.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Logs every event and fans it out to live subscribers (the `/ws` stream).
pub struct BroadcastAuditSink {
    tx: broadcast::Sender<AuditEvent>,
}

impl BroadcastAuditSink {
    pub fn new(tx: broadcast::Sender<AuditEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AuditSink for BroadcastAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        info!(
            actor_id = %event.actor_id,
            group_id = %event.group_id,
            action = ?event.action,
            entity_id = %event.entity_id,
            "audit event"
        );

        // No subscribers is not a failure.
        let _ = self.tx.send(event);
        Ok(())
    }
}
