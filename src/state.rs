use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::audit::BroadcastAuditSink;
use crate::auth::{InMemoryPermissions, Permission};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::engine::lifecycle::AssignmentManager;
use crate::engine::queries::AssignmentQueries;
use crate::models::audit::AuditEvent;
use crate::observability::metrics::Metrics;
use crate::store::{InMemoryAssignmentStore, InMemoryFleet};

pub struct AppState {
    pub manager: AssignmentManager,
    pub queries: AssignmentQueries,
    pub assignments: Arc<InMemoryAssignmentStore>,
    pub fleet: Arc<InMemoryFleet>,
    pub permissions: Arc<InMemoryPermissions>,
    pub audit_events_tx: broadcast::Sender<AuditEvent>,
    pub metrics: Metrics,
}

impl AppState {
    /// Builds the runtime state and seeds the configured admin grant.
    pub fn from_config(config: &Config) -> Self {
        let state = Self::new(config.audit_buffer_size, config.operation_timeout);
        if let Some(admin) = config.admin {
            state
                .permissions
                .grant(admin.actor_id, admin.group_id, Permission::ALL);
            tracing::info!(
                actor_id = %admin.actor_id,
                group_id = %admin.group_id,
                "seeded admin permissions"
            );
        }
        state
    }

    pub fn new(audit_buffer_size: usize, operation_timeout: Option<Duration>) -> Self {
        Self::with_clock(audit_buffer_size, operation_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(
        audit_buffer_size: usize,
        operation_timeout: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (audit_events_tx, _unused_rx) = broadcast::channel(audit_buffer_size);
        let assignments = Arc::new(InMemoryAssignmentStore::new());
        let fleet = Arc::new(InMemoryFleet::new());
        let metrics = Metrics::new();

        let manager = AssignmentManager::new(
            assignments.clone(),
            fleet.clone(),
            Arc::new(BroadcastAuditSink::new(audit_events_tx.clone())),
            clock.clone(),
            metrics.clone(),
        )
        .with_timeout(operation_timeout);
        let queries = AssignmentQueries::new(assignments.clone(), fleet.clone(), clock);

        Self {
            manager,
            queries,
            assignments,
            fleet,
            permissions: Arc::new(InMemoryPermissions::new()),
            audit_events_tx,
            metrics,
        }
    }
}
