use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Active,
    OnLeave,
    Suspended,
    Inactive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Active,
    Maintenance,
    OutOfService,
    Retired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub status: DriverStatus,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// Candidate for a new assignment. Existing assignments are never re-checked.
    pub fn is_eligible(&self) -> bool {
        self.enabled && self.status == DriverStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub plate: String,
    pub status: VehicleStatus,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn is_eligible(&self) -> bool {
        self.enabled && self.status == VehicleStatus::Active
    }
}
