use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::assignment::Assignment;
use crate::store::{AssignmentStore, StoreError};

#[derive(Default)]
pub struct InMemoryAssignmentStore {
    assignments: DashMap<Uuid, Assignment>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    fn collect_where<F>(&self, predicate: F) -> Vec<Assignment>
    where
        F: Fn(&Assignment) -> bool,
    {
        self.assignments
            .iter()
            .filter_map(|entry| {
                let assignment = entry.value();
                if predicate(assignment) {
                    Some(assignment.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn insert(&self, assignment: Assignment) -> Result<Assignment, StoreError> {
        match self.assignments.entry(assignment.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(assignment.id)),
            Entry::Vacant(slot) => {
                slot.insert(assignment.clone());
                Ok(assignment)
            }
        }
    }

    async fn update_by_id(&self, assignment: Assignment) -> Result<Assignment, StoreError> {
        let mut stored = self
            .assignments
            .get_mut(&assignment.id)
            .ok_or(StoreError::Missing(assignment.id))?;

        *stored = assignment.clone();
        Ok(assignment)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.assignments.remove(&id).is_some())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>, StoreError> {
        Ok(self.assignments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_driver(&self, driver_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        Ok(self.collect_where(|assignment| assignment.driver_id == driver_id))
    }

    async fn find_by_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        Ok(self.collect_where(|assignment| assignment.vehicle_id == vehicle_id))
    }

    async fn find_by_group(&self, group_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        Ok(self.collect_where(|assignment| assignment.group_id == group_id))
    }
}
