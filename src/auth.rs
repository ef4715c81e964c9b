use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Permission {
    #[serde(rename = "assignments.view")]
    AssignmentsView,
    #[serde(rename = "assignments.create")]
    AssignmentsCreate,
    #[serde(rename = "assignments.edit")]
    AssignmentsEdit,
    #[serde(rename = "assignments.delete")]
    AssignmentsDelete,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::AssignmentsView,
        Permission::AssignmentsCreate,
        Permission::AssignmentsEdit,
        Permission::AssignmentsDelete,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Permission::AssignmentsView => "assignments.view",
            Permission::AssignmentsCreate => "assignments.create",
            Permission::AssignmentsEdit => "assignments.edit",
            Permission::AssignmentsDelete => "assignments.delete",
        }
    }
}

/// Consulted by the HTTP layer before any engine call.
#[async_trait]
pub trait PermissionCheck: Send + Sync {
    async fn is_authorized(&self, actor_id: Uuid, group_id: Uuid, permission: Permission) -> bool;
}

#[derive(Default)]
pub struct InMemoryPermissions {
    grants: DashMap<(Uuid, Uuid), HashSet<Permission>>,
}

impl InMemoryPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant<I>(&self, actor_id: Uuid, group_id: Uuid, permissions: I)
    where
        I: IntoIterator<Item = Permission>,
    {
        self.grants
            .entry((actor_id, group_id))
            .or_default()
            .extend(permissions);
    }

    pub fn revoke(&self, actor_id: Uuid, group_id: Uuid, permission: Permission) {
        if let Some(mut granted) = self.grants.get_mut(&(actor_id, group_id)) {
            granted.remove(&permission);
        }
    }
}

#[async_trait]
impl PermissionCheck for InMemoryPermissions {
    async fn is_authorized(&self, actor_id: Uuid, group_id: Uuid, permission: Permission) -> bool {
        self.grants
            .get(&(actor_id, group_id))
            .is_some_and(|granted| granted.contains(&permission))
    }
}
