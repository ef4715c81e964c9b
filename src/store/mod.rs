//! Persistence ports consumed by the engine, with in-memory adapters.

pub mod fleet;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::assignment::Assignment;

pub use fleet::{FleetDirectory, InMemoryFleet};
pub use memory::InMemoryAssignmentStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("assignment {0} does not exist in the store")]
    Missing(Uuid),

    #[error("assignment {0} already exists in the store")]
    Duplicate(Uuid),
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn insert(&self, assignment: Assignment) -> Result<Assignment, StoreError>;

    /// Replaces the stored record with the same id.
    async fn update_by_id(&self, assignment: Assignment) -> Result<Assignment, StoreError>;

    /// Returns whether a record was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>, StoreError>;

    async fn find_by_driver(&self, driver_id: Uuid) -> Result<Vec<Assignment>, StoreError>;

    async fn find_by_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Assignment>, StoreError>;

    async fn find_by_group(&self, group_id: Uuid) -> Result<Vec<Assignment>, StoreError>;
}
