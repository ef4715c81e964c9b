use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::assignment::{Assignment, AssignmentRole};
use crate::store::{AssignmentStore, StoreError};

/// Read-only role checks against a driver's assignments, evaluated at call time.
#[derive(Clone)]
pub struct ExclusivityChecker {
    store: Arc<dyn AssignmentStore>,
    clock: Arc<dyn Clock>,
}

impl ExclusivityChecker {
    pub fn new(store: Arc<dyn AssignmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn has_active_primary_assignment(&self, driver_id: Uuid) -> Result<bool, StoreError> {
        self.has_active_assignment_with_role(driver_id, AssignmentRole::Primary)
            .await
    }

    pub async fn has_active_assignment_with_role(
        &self,
        driver_id: Uuid,
        role: AssignmentRole,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let found = self.store.find_by_driver(driver_id).await?;
        Ok(found
            .iter()
            .any(|assignment| assignment.is_active_with_role(role, now)))
    }

    /// Every active assignment of the driver holding `role` as of `now`.
    pub async fn active_with_role(
        &self,
        driver_id: Uuid,
        role: AssignmentRole,
        now: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, StoreError> {
        let found = self.store.find_by_driver(driver_id).await?;
        Ok(found
            .into_iter()
            .filter(|assignment| assignment.is_active_with_role(role, now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::ExclusivityChecker;
    use crate::clock::FixedClock;
    use crate::models::assignment::{Assignment, AssignmentRole, AssignmentType};
    use crate::store::{AssignmentStore, InMemoryAssignmentStore};

    fn record(driver: Uuid, role: AssignmentRole, end_date: Option<chrono::DateTime<Utc>>) -> Assignment {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Assignment {
            id: Uuid::new_v4(),
            group_id: Uuid::from_u128(1),
            vehicle_id: Uuid::new_v4(),
            driver_id: driver,
            role,
            assignment_type: AssignmentType::Operation,
            start_date: start,
            end_date,
            start_mileage: None,
            end_mileage: None,
            start_fuel_level: None,
            end_fuel_level: None,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    fn setup() -> (Arc<InMemoryAssignmentStore>, Arc<FixedClock>, ExclusivityChecker) {
        let store = Arc::new(InMemoryAssignmentStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        ));
        let checker = ExclusivityChecker::new(store.clone(), clock.clone());
        (store, clock, checker)
    }

    #[tokio::test]
    async fn driver_without_assignments_has_no_primary() {
        let (_store, _clock, checker) = setup();

        assert!(!checker.has_active_primary_assignment(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn open_primary_is_detected() {
        let (store, _clock, checker) = setup();
        let driver = Uuid::new_v4();
        store.insert(record(driver, AssignmentRole::Primary, None)).await.unwrap();

        assert!(checker.has_active_primary_assignment(driver).await.unwrap());
        assert!(!checker
            .has_active_assignment_with_role(driver, AssignmentRole::Temp)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn primary_ending_in_the_future_stays_active_until_it_passes() {
        let (store, clock, checker) = setup();
        let driver = Uuid::new_v4();
        let end = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        store
            .insert(record(driver, AssignmentRole::Primary, Some(end)))
            .await
            .unwrap();

        assert!(checker.has_active_primary_assignment(driver).await.unwrap());

        clock.set(end + Duration::seconds(1));
        assert!(!checker.has_active_primary_assignment(driver).await.unwrap());
    }

    #[tokio::test]
    async fn other_drivers_do_not_count() {
        let (store, _clock, checker) = setup();
        store
            .insert(record(Uuid::new_v4(), AssignmentRole::Primary, None))
            .await
            .unwrap();

        assert!(!checker.has_active_primary_assignment(Uuid::new_v4()).await.unwrap());
    }
}
