use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::{authorize, json_body};
use crate::auth::Permission;
use crate::engine::queries::{Candidates, Partitioned};
use crate::error::AppError;
use crate::models::assignment::{
    Assignment, AssignmentChanges, AssignmentFilter, AssignmentRole, AssignmentType,
    EndAssignment, NewAssignment,
};
use crate::state::AppState;
use crate::store::FleetDirectory;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/groups/:group_id/assignments",
            post(create_assignment).get(list_assignments),
        )
        .route(
            "/groups/:group_id/assignments/:id",
            get(get_assignment)
                .patch(update_assignment)
                .delete(delete_assignment),
        )
        .route("/groups/:group_id/assignments/:id/end", post(end_assignment))
        .route(
            "/groups/:group_id/vehicles/:vehicle_id/assignments",
            get(vehicle_assignments),
        )
        .route(
            "/groups/:group_id/vehicles/:vehicle_id/active-assignment",
            get(vehicle_active_assignment),
        )
        .route(
            "/groups/:group_id/drivers/:driver_id/assignments",
            get(driver_assignments),
        )
        .route(
            "/groups/:group_id/drivers/:driver_id/exclusivity",
            get(driver_exclusivity),
        )
        .route("/groups/:group_id/candidates", get(candidates))
}

#[derive(Deserialize)]
pub struct CreateAssignmentRequest {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub role: AssignmentRole,
    pub assignment_type: AssignmentType,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub start_mileage: Option<u64>,
    pub start_fuel_level: Option<u8>,
    pub notes: Option<String>,
}

impl CreateAssignmentRequest {
    fn into_new(self, group_id: Uuid) -> NewAssignment {
        NewAssignment {
            group_id,
            vehicle_id: self.vehicle_id,
            driver_id: self.driver_id,
            role: self.role,
            assignment_type: self.assignment_type,
            start_date: self.start_date,
            end_date: self.end_date,
            start_mileage: self.start_mileage,
            start_fuel_level: self.start_fuel_level,
            notes: self.notes,
        }
    }
}

#[derive(Deserialize)]
pub struct ExclusivityQuery {
    pub role: Option<AssignmentRole>,
}

#[derive(Serialize)]
pub struct ExclusivityResponse {
    pub driver_id: Uuid,
    pub role: AssignmentRole,
    pub has_active: bool,
}

async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<CreateAssignmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Assignment>), AppError> {
    let actor_id = authorize(&state, &headers, group_id, Permission::AssignmentsCreate).await?;
    let request = json_body(payload)?;

    let created = state
        .manager
        .create(actor_id, request.into_new(group_id))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    Query(filter): Query<AssignmentFilter>,
    headers: HeaderMap,
) -> Result<Json<Vec<Assignment>>, AppError> {
    authorize(&state, &headers, group_id, Permission::AssignmentsView).await?;

    let assignments = state.queries.list_by_group(group_id, &filter).await?;
    Ok(Json(assignments))
}

async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Path((group_id, id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<Assignment>, AppError> {
    authorize(&state, &headers, group_id, Permission::AssignmentsView).await?;

    Ok(Json(state.queries.find(group_id, id).await?))
}

async fn update_assignment(
    State(state): State<Arc<AppState>>,
    Path((group_id, id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    payload: Result<Json<AssignmentChanges>, JsonRejection>,
) -> Result<Json<Assignment>, AppError> {
    let actor_id = authorize(&state, &headers, group_id, Permission::AssignmentsEdit).await?;
    let changes = json_body(payload)?;

    let updated = state.manager.update(actor_id, group_id, id, changes).await?;
    Ok(Json(updated))
}

async fn end_assignment(
    State(state): State<Arc<AppState>>,
    Path((group_id, id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    payload: Result<Json<EndAssignment>, JsonRejection>,
) -> Result<Json<Assignment>, AppError> {
    let actor_id = authorize(&state, &headers, group_id, Permission::AssignmentsEdit).await?;
    let end = json_body(payload)?;

    let ended = state.manager.end(actor_id, group_id, id, end).await?;
    Ok(Json(ended))
}

async fn delete_assignment(
    State(state): State<Arc<AppState>>,
    Path((group_id, id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let actor_id = authorize(&state, &headers, group_id, Permission::AssignmentsDelete).await?;

    state.manager.delete(actor_id, group_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn vehicle_assignments(
    State(state): State<Arc<AppState>>,
    Path((group_id, vehicle_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<Partitioned>, AppError> {
    authorize(&state, &headers, group_id, Permission::AssignmentsView).await?;

    let mut split = state.queries.partition_by_vehicle(vehicle_id).await?;
    retain_group(&mut split, group_id);
    Ok(Json(split))
}

async fn vehicle_active_assignment(
    State(state): State<Arc<AppState>>,
    Path((group_id, vehicle_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<Option<Assignment>>, AppError> {
    authorize(&state, &headers, group_id, Permission::AssignmentsView).await?;

    let active = state
        .queries
        .get_active_for_vehicle(vehicle_id)
        .await?
        .filter(|assignment| assignment.group_id == group_id);
    Ok(Json(active))
}

async fn driver_assignments(
    State(state): State<Arc<AppState>>,
    Path((group_id, driver_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<Partitioned>, AppError> {
    authorize(&state, &headers, group_id, Permission::AssignmentsView).await?;

    let mut split = state.queries.partition_by_driver(driver_id).await?;
    retain_group(&mut split, group_id);
    Ok(Json(split))
}

/// Lets a form warn before a create that would auto-close a PRIMARY.
async fn driver_exclusivity(
    State(state): State<Arc<AppState>>,
    Path((group_id, driver_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<ExclusivityQuery>,
    headers: HeaderMap,
) -> Result<Json<ExclusivityResponse>, AppError> {
    authorize(&state, &headers, group_id, Permission::AssignmentsView).await?;

    state
        .fleet
        .get_driver(driver_id)
        .await?
        .filter(|driver| driver.group_id == group_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    let role = query.role.unwrap_or(AssignmentRole::Primary);
    let has_active = state
        .manager
        .exclusivity()
        .has_active_assignment_with_role(driver_id, role)
        .await?;

    Ok(Json(ExclusivityResponse {
        driver_id,
        role,
        has_active,
    }))
}

async fn candidates(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Candidates>, AppError> {
    authorize(&state, &headers, group_id, Permission::AssignmentsCreate).await?;

    Ok(Json(state.queries.candidates(group_id).await?))
}

fn retain_group(split: &mut Partitioned, group_id: Uuid) {
    split.active.retain(|assignment| assignment.group_id == group_id);
    split
        .historical
        .retain(|assignment| assignment.group_id == group_id);
}
