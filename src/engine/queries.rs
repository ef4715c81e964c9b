use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentFilter, AssignmentRole};
use crate::models::fleet::{Driver, Vehicle};
use crate::store::{AssignmentStore, FleetDirectory, StoreError};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Partitioned {
    pub active: Vec<Assignment>,
    pub historical: Vec<Assignment>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Candidates {
    pub drivers: Vec<Driver>,
    pub vehicles: Vec<Vehicle>,
}

/// Splits assignments by the active predicate as of `now`, preserving order.
pub fn partition(assignments: Vec<Assignment>, now: DateTime<Utc>) -> Partitioned {
    let (active, historical): (Vec<Assignment>, Vec<Assignment>) = assignments
        .into_iter()
        .partition(|assignment| assignment.is_active(now));
    Partitioned { active, historical }
}

/// Newest start first, ties broken by creation time.
fn sort_newest_first(assignments: &mut [Assignment]) {
    assignments.sort_by(|a, b| {
        b.start_date
            .cmp(&a.start_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Read side. Active state is recomputed from `end_date` on every call.
#[derive(Clone)]
pub struct AssignmentQueries {
    store: Arc<dyn AssignmentStore>,
    fleet: Arc<dyn FleetDirectory>,
    clock: Arc<dyn Clock>,
}

impl AssignmentQueries {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        fleet: Arc<dyn FleetDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, fleet, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn find(&self, group_id: Uuid, id: Uuid) -> Result<Assignment, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .filter(|assignment| assignment.group_id == group_id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {id} not found")))
    }

    pub async fn list_by_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        let mut found = self.store.find_by_vehicle(vehicle_id).await?;
        sort_newest_first(&mut found);
        Ok(found)
    }

    pub async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        let mut found = self.store.find_by_driver(driver_id).await?;
        sort_newest_first(&mut found);
        Ok(found)
    }

    pub async fn list_by_group(
        &self,
        group_id: Uuid,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, StoreError> {
        let now = self.clock.now();
        let mut found: Vec<Assignment> = self
            .store
            .find_by_group(group_id)
            .await?
            .into_iter()
            .filter(|assignment| filter.matches(assignment, now))
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    /// The active PRIMARY on the vehicle, if any. Other active roles are ignored.
    pub async fn get_active_for_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> Result<Option<Assignment>, StoreError> {
        let now = self.clock.now();
        let found = self.list_by_vehicle(vehicle_id).await?;
        Ok(found
            .into_iter()
            .find(|assignment| assignment.is_active_with_role(AssignmentRole::Primary, now)))
    }

    pub async fn partition_by_vehicle(&self, vehicle_id: Uuid) -> Result<Partitioned, StoreError> {
        let found = self.list_by_vehicle(vehicle_id).await?;
        Ok(partition(found, self.clock.now()))
    }

    pub async fn partition_by_driver(&self, driver_id: Uuid) -> Result<Partitioned, StoreError> {
        let found = self.list_by_driver(driver_id).await?;
        Ok(partition(found, self.clock.now()))
    }

    /// Drivers and vehicles of the group that may be picked for a new assignment.
    pub async fn candidates(&self, group_id: Uuid) -> Result<Candidates, StoreError> {
        let mut drivers: Vec<Driver> = self
            .fleet
            .list_drivers(group_id)
            .await?
            .into_iter()
            .filter(Driver::is_eligible)
            .collect();
        drivers.sort_by(|a, b| a.name.cmp(&b.name));

        let mut vehicles: Vec<Vehicle> = self
            .fleet
            .list_vehicles(group_id)
            .await?
            .into_iter()
            .filter(Vehicle::is_eligible)
            .collect();
        vehicles.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Candidates { drivers, vehicles })
    }
}
