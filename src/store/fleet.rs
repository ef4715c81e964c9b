use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::fleet::{Driver, DriverStatus, Vehicle, VehicleStatus};
use crate::store::StoreError;

/// Driver/vehicle lookup owned by the fleet registry.
#[async_trait]
pub trait FleetDirectory: Send + Sync {
    async fn get_driver(&self, driver_id: Uuid) -> Result<Option<Driver>, StoreError>;

    async fn get_vehicle(&self, vehicle_id: Uuid) -> Result<Option<Vehicle>, StoreError>;

    async fn list_drivers(&self, group_id: Uuid) -> Result<Vec<Driver>, StoreError>;

    async fn list_vehicles(&self, group_id: Uuid) -> Result<Vec<Vehicle>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryFleet {
    drivers: DashMap<Uuid, Driver>,
    vehicles: DashMap<Uuid, Vehicle>,
}

impl InMemoryFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_driver(&self, driver: Driver) {
        self.drivers.insert(driver.id, driver);
    }

    pub fn upsert_vehicle(&self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id, vehicle);
    }

    pub fn set_driver_status(
        &self,
        driver_id: Uuid,
        status: DriverStatus,
        enabled: Option<bool>,
    ) -> Option<Driver> {
        let mut driver = self.drivers.get_mut(&driver_id)?;
        driver.status = status;
        if let Some(enabled) = enabled {
            driver.enabled = enabled;
        }
        driver.updated_at = Utc::now();
        Some(driver.clone())
    }

    pub fn set_vehicle_status(
        &self,
        vehicle_id: Uuid,
        status: VehicleStatus,
        enabled: Option<bool>,
    ) -> Option<Vehicle> {
        let mut vehicle = self.vehicles.get_mut(&vehicle_id)?;
        vehicle.status = status;
        if let Some(enabled) = enabled {
            vehicle.enabled = enabled;
        }
        vehicle.updated_at = Utc::now();
        Some(vehicle.clone())
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }
}

#[async_trait]
impl FleetDirectory for InMemoryFleet {
    async fn get_driver(&self, driver_id: Uuid) -> Result<Option<Driver>, StoreError> {
        Ok(self.drivers.get(&driver_id).map(|entry| entry.value().clone()))
    }

    async fn get_vehicle(&self, vehicle_id: Uuid) -> Result<Option<Vehicle>, StoreError> {
        Ok(self.vehicles.get(&vehicle_id).map(|entry| entry.value().clone()))
    }

    async fn list_drivers(&self, group_id: Uuid) -> Result<Vec<Driver>, StoreError> {
        Ok(self
            .drivers
            .iter()
            .filter(|entry| entry.value().group_id == group_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn list_vehicles(&self, group_id: Uuid) -> Result<Vec<Vehicle>, StoreError> {
        Ok(self
            .vehicles
            .iter()
            .filter(|entry| entry.value().group_id == group_id)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
