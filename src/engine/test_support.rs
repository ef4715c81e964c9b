use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::audit::{AuditError, AuditSink};
use crate::clock::FixedClock;
use crate::engine::lifecycle::AssignmentManager;
use crate::engine::queries::AssignmentQueries;
use crate::models::assignment::{Assignment, AssignmentRole, AssignmentType, NewAssignment};
use crate::models::audit::AuditEvent;
use crate::models::fleet::{Driver, DriverStatus, Vehicle, VehicleStatus};
use crate::observability::metrics::Metrics;
use crate::store::{AssignmentStore, InMemoryAssignmentStore, InMemoryFleet, StoreError};

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

#[derive(Default)]
pub struct RecordingAuditSink {
    pub events: Mutex<Vec<AuditEvent>>,
    pub failing: AtomicBool,
}

impl RecordingAuditSink {
    pub fn recorded(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::Rejected("audit backend offline".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Wraps the in-memory store with switchable failures and latency.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: InMemoryAssignmentStore,
    pub fail_updates: AtomicBool,
    pub fail_inserts: AtomicBool,
    pub insert_delay: Mutex<Option<Duration>>,
}

#[async_trait]
impl AssignmentStore for FaultyStore {
    async fn insert(&self, assignment: Assignment) -> Result<Assignment, StoreError> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert refused".to_string()));
        }
        self.inner.insert(assignment).await
    }

    async fn update_by_id(&self, assignment: Assignment) -> Result<Assignment, StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("update refused".to_string()));
        }
        self.inner.update_by_id(assignment).await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_by_id(id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_driver(&self, driver_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        self.inner.find_by_driver(driver_id).await
    }

    async fn find_by_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        self.inner.find_by_vehicle(vehicle_id).await
    }

    async fn find_by_group(&self, group_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        self.inner.find_by_group(group_id).await
    }
}

pub struct Harness {
    pub manager: AssignmentManager,
    pub queries: AssignmentQueries,
    pub store: Arc<FaultyStore>,
    pub fleet: Arc<InMemoryFleet>,
    pub audit: Arc<RecordingAuditSink>,
    pub clock: Arc<FixedClock>,
    pub metrics: Metrics,
    pub actor: Uuid,
    pub group: Uuid,
    pub drivers: Vec<Uuid>,
    pub vehicles: Vec<Uuid>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(FaultyStore::default());
        let fleet = Arc::new(InMemoryFleet::new());
        let audit = Arc::new(RecordingAuditSink::default());
        let clock = Arc::new(FixedClock::new(at(2024, 2, 1)));
        let metrics = Metrics::new();
        let group = Uuid::new_v4();

        let drivers = (1..=3)
            .map(|n| {
                let driver = Driver {
                    id: Uuid::new_v4(),
                    group_id: group,
                    name: format!("Driver {n}"),
                    status: DriverStatus::Active,
                    enabled: true,
                    updated_at: at(2024, 1, 1),
                };
                let id = driver.id;
                fleet.upsert_driver(driver);
                id
            })
            .collect();

        let vehicles = (1..=3)
            .map(|n| {
                let vehicle = Vehicle {
                    id: Uuid::new_v4(),
                    group_id: group,
                    name: format!("Truck {n}"),
                    plate: format!("FL-{n:03}"),
                    status: VehicleStatus::Active,
                    enabled: true,
                    updated_at: at(2024, 1, 1),
                };
                let id = vehicle.id;
                fleet.upsert_vehicle(vehicle);
                id
            })
            .collect();

        let manager = AssignmentManager::new(
            store.clone(),
            fleet.clone(),
            audit.clone(),
            clock.clone(),
            metrics.clone(),
        );
        let queries = AssignmentQueries::new(store.clone(), fleet.clone(), clock.clone());

        Self {
            manager,
            queries,
            store,
            fleet,
            audit,
            clock,
            metrics,
            actor: Uuid::new_v4(),
            group,
            drivers,
            vehicles,
        }
    }

    pub fn new_assignment(&self, driver: Uuid, vehicle: Uuid, role: AssignmentRole) -> NewAssignment {
        NewAssignment {
            group_id: self.group,
            vehicle_id: vehicle,
            driver_id: driver,
            role,
            assignment_type: AssignmentType::Operation,
            start_date: self.clock_now(),
            end_date: None,
            start_mileage: None,
            start_fuel_level: None,
            notes: None,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use crate::clock::Clock;
        self.clock.now()
    }

    pub async fn active_primaries(&self, driver: Uuid) -> Vec<Assignment> {
        let now = self.clock_now();
        self.store
            .find_by_driver(driver)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_active_with_role(AssignmentRole::Primary, now))
            .collect()
    }
}
