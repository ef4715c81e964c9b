use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::clock::Clock;
use crate::engine::exclusivity::ExclusivityChecker;
use crate::error::AppError;
use crate::models::assignment::{
    Assignment, AssignmentChanges, AssignmentRole, EndAssignment, NewAssignment,
};
use crate::models::audit::{AuditAction, AuditEvent, ASSIGNMENT_ENTITY};
use crate::observability::metrics::Metrics;
use crate::store::{AssignmentStore, FleetDirectory};

const MAX_FUEL_LEVEL: u8 = 100;

/// Create / update / end / delete for assignments.
///
/// Callers are expected to have checked the actor's permissions already.
/// Making a driver's assignment an active PRIMARY first ends any other active
/// PRIMARY of that driver; that write always lands before the new state is
/// written, and its failure aborts the operation.
pub struct AssignmentManager {
    store: Arc<dyn AssignmentStore>,
    fleet: Arc<dyn FleetDirectory>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    exclusivity: ExclusivityChecker,
    metrics: Metrics,
    driver_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    timeout: Option<Duration>,
}

impl AssignmentManager {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        fleet: Arc<dyn FleetDirectory>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        let exclusivity = ExclusivityChecker::new(store.clone(), clock.clone());
        Self {
            store,
            fleet,
            audit,
            clock,
            exclusivity,
            metrics,
            driver_locks: DashMap::new(),
            timeout: None,
        }
    }

    /// Deadline applied to each operation; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn exclusivity(&self) -> &ExclusivityChecker {
        &self.exclusivity
    }

    pub async fn create(&self, actor_id: Uuid, input: NewAssignment) -> Result<Assignment, AppError> {
        self.bounded("create", self.create_unbounded(actor_id, input))
            .await
    }

    pub async fn update(
        &self,
        actor_id: Uuid,
        group_id: Uuid,
        id: Uuid,
        changes: AssignmentChanges,
    ) -> Result<Assignment, AppError> {
        self.bounded("update", self.update_unbounded(actor_id, group_id, id, changes))
            .await
    }

    pub async fn end(
        &self,
        actor_id: Uuid,
        group_id: Uuid,
        id: Uuid,
        end: EndAssignment,
    ) -> Result<Assignment, AppError> {
        self.bounded("end", self.end_unbounded(actor_id, group_id, id, end))
            .await
    }

    pub async fn delete(&self, actor_id: Uuid, group_id: Uuid, id: Uuid) -> Result<(), AppError> {
        self.bounded("delete", self.delete_unbounded(actor_id, group_id, id))
            .await
    }

    async fn create_unbounded(
        &self,
        actor_id: Uuid,
        input: NewAssignment,
    ) -> Result<Assignment, AppError> {
        validate_fuel_level("start_fuel_level", input.start_fuel_level)?;

        let driver = self
            .fleet
            .get_driver(input.driver_id)
            .await?
            .filter(|driver| driver.group_id == input.group_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {} not found", input.driver_id)))?;
        let vehicle = self
            .fleet
            .get_vehicle(input.vehicle_id)
            .await?
            .filter(|vehicle| vehicle.group_id == input.group_id)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {} not found", input.vehicle_id)))?;

        let _lock = self.lock_driver(input.driver_id).await;

        let now = self.clock.now();
        let assignment = Assignment {
            id: Uuid::new_v4(),
            group_id: input.group_id,
            vehicle_id: input.vehicle_id,
            driver_id: input.driver_id,
            role: input.role,
            assignment_type: input.assignment_type,
            start_date: input.start_date,
            end_date: input.end_date,
            start_mileage: input.start_mileage,
            end_mileage: None,
            start_fuel_level: input.start_fuel_level,
            end_fuel_level: None,
            notes: normalize_notes(input.notes),
            created_at: now,
            updated_at: now,
        };

        let closed = self.close_conflicting_primaries(&assignment, now).await?;
        let inserted = self.store.insert(assignment).await;
        self.audit_auto_closed(actor_id, &closed, inserted.as_ref().ok().map(|a| a.id))
            .await;
        let created = inserted?;
        let auto_closed: Vec<Uuid> = closed.iter().map(|prior| prior.id).collect();

        info!(
            assignment_id = %created.id,
            driver_id = %created.driver_id,
            vehicle_id = %created.vehicle_id,
            role = ?created.role,
            auto_closed = auto_closed.len(),
            "assignment created"
        );

        self.emit(
            actor_id,
            created.group_id,
            AuditAction::Create,
            created.id,
            json!({
                "driver_name": driver.name,
                "vehicle_name": vehicle.name,
                "driver_id": created.driver_id,
                "vehicle_id": created.vehicle_id,
                "role": created.role,
                "assignment_type": created.assignment_type,
                "auto_closed": auto_closed,
            }),
        )
        .await;

        Ok(created)
    }

    async fn update_unbounded(
        &self,
        actor_id: Uuid,
        group_id: Uuid,
        id: Uuid,
        changes: AssignmentChanges,
    ) -> Result<Assignment, AppError> {
        validate_fuel_level("start_fuel_level", changes.start_fuel_level)?;

        let existing = self.load_in_group(group_id, id).await?;
        if changes.vehicle_id.is_some_and(|vehicle| vehicle != existing.vehicle_id)
            || changes.driver_id.is_some_and(|driver| driver != existing.driver_id)
        {
            debug!(assignment_id = %id, "ignoring vehicle/driver change on update");
        }

        let _lock = self.lock_driver(existing.driver_id).await;

        // Re-read under the driver lock so concurrent auto-closes are visible.
        let current = self.load_in_group(group_id, id).await?;
        let now = self.clock.now();

        let mut changed = Vec::new();
        let mut updated = current.clone();
        if let Some(role) = changes.role {
            updated.role = role;
            changed.push("role");
        }
        if let Some(assignment_type) = changes.assignment_type {
            updated.assignment_type = assignment_type;
            changed.push("assignment_type");
        }
        if let Some(start_date) = changes.start_date {
            updated.start_date = start_date;
            changed.push("start_date");
        }
        if let Some(end_date) = changes.end_date {
            updated.end_date = end_date;
            changed.push("end_date");
        }
        if let Some(start_mileage) = changes.start_mileage {
            updated.start_mileage = Some(start_mileage);
            changed.push("start_mileage");
        }
        if let Some(start_fuel_level) = changes.start_fuel_level {
            updated.start_fuel_level = Some(start_fuel_level);
            changed.push("start_fuel_level");
        }
        if let Some(notes) = changes.notes {
            updated.notes = normalize_notes(Some(notes));
            changed.push("notes");
        }
        updated.updated_at = now;

        let closed = self.close_conflicting_primaries(&updated, now).await?;
        let written = self.store.update_by_id(updated).await;
        self.audit_auto_closed(actor_id, &closed, written.as_ref().ok().map(|a| a.id))
            .await;
        let saved = written?;
        let auto_closed: Vec<Uuid> = closed.iter().map(|prior| prior.id).collect();

        info!(
            assignment_id = %saved.id,
            changed = ?changed,
            auto_closed = auto_closed.len(),
            "assignment updated"
        );

        self.emit(
            actor_id,
            saved.group_id,
            AuditAction::Update,
            saved.id,
            json!({
                "driver_id": saved.driver_id,
                "vehicle_id": saved.vehicle_id,
                "changed": changed,
                "auto_closed": auto_closed,
            }),
        )
        .await;

        Ok(saved)
    }

    async fn end_unbounded(
        &self,
        actor_id: Uuid,
        group_id: Uuid,
        id: Uuid,
        end: EndAssignment,
    ) -> Result<Assignment, AppError> {
        validate_fuel_level("end_fuel_level", end.end_fuel_level)?;

        let existing = self.load_in_group(group_id, id).await?;
        let _lock = self.lock_driver(existing.driver_id).await;

        let current = self.load_in_group(group_id, id).await?;
        let now = self.clock.now();
        let was_active = current.is_active(now);
        if !was_active {
            debug!(assignment_id = %id, "ending an assignment that is already historical");
        }

        let mut ended = current;
        ended.end_date = Some(end.end_date.unwrap_or(now));
        if let Some(end_mileage) = end.end_mileage {
            ended.end_mileage = Some(end_mileage);
        }
        if let Some(end_fuel_level) = end.end_fuel_level {
            ended.end_fuel_level = Some(end_fuel_level);
        }
        if let Some(notes) = end.notes {
            ended.notes = normalize_notes(Some(notes));
        }
        ended.updated_at = now;

        // An end date in the future keeps the record active until then.
        let closed = self.close_conflicting_primaries(&ended, now).await?;
        let written = self.store.update_by_id(ended).await;
        self.audit_auto_closed(actor_id, &closed, written.as_ref().ok().map(|a| a.id))
            .await;
        let saved = written?;
        let auto_closed: Vec<Uuid> = closed.iter().map(|prior| prior.id).collect();

        info!(
            assignment_id = %saved.id,
            end_date = ?saved.end_date,
            was_active,
            "assignment ended"
        );

        self.emit(
            actor_id,
            saved.group_id,
            AuditAction::End,
            saved.id,
            json!({
                "driver_id": saved.driver_id,
                "vehicle_id": saved.vehicle_id,
                "end_date": saved.end_date,
                "end_mileage": saved.end_mileage,
                "end_fuel_level": saved.end_fuel_level,
                "was_active": was_active,
                "auto_closed": auto_closed,
            }),
        )
        .await;

        Ok(saved)
    }

    async fn delete_unbounded(&self, actor_id: Uuid, group_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let current = self.load_in_group(group_id, id).await?;
        let was_active = current.is_active(self.clock.now());

        if !self.store.delete_by_id(id).await? {
            return Err(AppError::NotFound(format!("assignment {id} not found")));
        }

        info!(assignment_id = %id, was_active, "assignment deleted");

        self.emit(
            actor_id,
            group_id,
            AuditAction::Delete,
            id,
            json!({
                "driver_id": current.driver_id,
                "vehicle_id": current.vehicle_id,
                "role": current.role,
                "was_active": was_active,
            }),
        )
        .await;

        Ok(())
    }

    /// Ends every other active PRIMARY of the candidate's driver when the
    /// candidate itself will be an active PRIMARY. Returns the closed records;
    /// auditing them waits until the candidate's own write has settled.
    async fn close_conflicting_primaries(
        &self,
        candidate: &Assignment,
        now: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, AppError> {
        if !candidate.role.is_exclusive() || !candidate.is_active(now) {
            return Ok(Vec::new());
        }
        if !self
            .exclusivity
            .has_active_primary_assignment(candidate.driver_id)
            .await?
        {
            return Ok(Vec::new());
        }

        let conflicting = self
            .exclusivity
            .active_with_role(candidate.driver_id, AssignmentRole::Primary, now)
            .await?;

        let mut closed = Vec::new();
        for mut prior in conflicting
            .into_iter()
            .filter(|prior| prior.id != candidate.id)
        {
            prior.end_date = Some(now);
            prior.updated_at = now;
            let prior = self.store.update_by_id(prior).await?;
            self.metrics.auto_closed_total.inc();

            info!(
                assignment_id = %prior.id,
                driver_id = %prior.driver_id,
                superseded_by = %candidate.id,
                "auto-closed primary assignment"
            );

            closed.push(prior);
        }

        Ok(closed)
    }

    /// `superseded_by` is null when the superseding write failed; the
    /// closed records stay closed either way.
    async fn audit_auto_closed(
        &self,
        actor_id: Uuid,
        closed: &[Assignment],
        superseded_by: Option<Uuid>,
    ) {
        for prior in closed {
            self.emit(
                actor_id,
                prior.group_id,
                AuditAction::AutoClose,
                prior.id,
                json!({
                    "driver_id": prior.driver_id,
                    "vehicle_id": prior.vehicle_id,
                    "superseded_by": superseded_by,
                    "end_date": prior.end_date,
                }),
            )
            .await;
        }
    }

    async fn load_in_group(&self, group_id: Uuid, id: Uuid) -> Result<Assignment, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .filter(|assignment| assignment.group_id == group_id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {id} not found")))
    }

    async fn lock_driver(&self, driver_id: Uuid) -> DriverLock<'_> {
        let lock = Arc::clone(&self.driver_locks.entry(driver_id).or_default());
        let guard = lock.lock_owned().await;
        DriverLock {
            locks: &self.driver_locks,
            driver_id,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn tracked_driver_locks(&self) -> usize {
        self.driver_locks.len()
    }

    async fn emit(
        &self,
        actor_id: Uuid,
        group_id: Uuid,
        action: AuditAction,
        entity_id: Uuid,
        metadata: serde_json::Value,
    ) {
        let event = AuditEvent {
            actor_id,
            group_id,
            action,
            entity_type: ASSIGNMENT_ENTITY.to_string(),
            entity_id,
            metadata,
            recorded_at: self.clock.now(),
        };

        if let Err(err) = self.audit.record(event).await {
            self.metrics.audit_events_dropped_total.inc();
            warn!(error = %err, entity_id = %entity_id, action = ?action, "failed to record audit event");
        }
    }

    async fn bounded<T, F>(&self, action: &'static str, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let start = Instant::now();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(format!(
                    "{action} exceeded {}ms",
                    limit.as_millis()
                ))),
            },
            None => operation.await,
        };

        self.metrics
            .observe_operation(action, result.is_ok(), start.elapsed().as_secs_f64());

        match &result {
            Err(err @ (AppError::Store(_) | AppError::Timeout(_) | AppError::Internal(_))) => {
                error!(action, error = %err, "assignment operation failed");
            }
            Err(err) => warn!(action, error = %err, "assignment operation rejected"),
            Ok(_) => {}
        }

        result
    }
}

/// Holds a driver's mutex; the map entry is dropped once nobody else waits on it.
struct DriverLock<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    driver_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DriverLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.driver_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn validate_fuel_level(field: &str, level: Option<u8>) -> Result<(), AppError> {
    match level {
        Some(level) if level > MAX_FUEL_LEVEL => Err(AppError::Validation(format!(
            "{field} must be between 0 and {MAX_FUEL_LEVEL}, got {level}"
        ))),
        _ => Ok(()),
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|notes| notes.trim().to_string())
        .filter(|notes| !notes.is_empty())
}
