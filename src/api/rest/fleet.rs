use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::json_body;
use crate::error::AppError;
use crate::models::fleet::{Driver, DriverStatus, Vehicle, VehicleStatus};
use crate::state::AppState;
use crate::store::FleetDirectory;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/groups/:group_id/drivers",
            post(create_driver).get(list_drivers),
        )
        .route(
            "/groups/:group_id/drivers/:driver_id/status",
            patch(update_driver_status),
        )
        .route(
            "/groups/:group_id/vehicles",
            post(create_vehicle).get(list_vehicles),
        )
        .route(
            "/groups/:group_id/vehicles/:vehicle_id/status",
            patch(update_vehicle_status),
        )
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub status: Option<DriverStatus>,
    pub enabled: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateVehicleRequest {
    pub name: String,
    pub plate: String,
    pub status: Option<VehicleStatus>,
    pub enabled: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateDriverStatusRequest {
    pub status: DriverStatus,
    pub enabled: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateVehicleStatusRequest {
    pub status: VehicleStatus,
    pub enabled: Option<bool>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    payload: Result<Json<CreateDriverRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    let payload = json_body(payload)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        group_id,
        name: payload.name.trim().to_string(),
        status: payload.status.unwrap_or(DriverStatus::Active),
        enabled: payload.enabled.unwrap_or(true),
        updated_at: Utc::now(),
    };

    state.fleet.upsert_driver(driver.clone());
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<Driver>>, AppError> {
    let mut drivers = state.fleet.list_drivers(group_id).await?;
    drivers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(drivers))
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path((group_id, driver_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateDriverStatusRequest>, JsonRejection>,
) -> Result<Json<Driver>, AppError> {
    let payload = json_body(payload)?;
    let not_found = || AppError::NotFound(format!("driver {driver_id} not found"));

    state
        .fleet
        .get_driver(driver_id)
        .await?
        .filter(|driver| driver.group_id == group_id)
        .ok_or_else(not_found)?;

    let driver = state
        .fleet
        .set_driver_status(driver_id, payload.status, payload.enabled)
        .ok_or_else(not_found)?;
    Ok(Json(driver))
}

async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    payload: Result<Json<CreateVehicleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let payload = json_body(payload)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if payload.plate.trim().is_empty() {
        return Err(AppError::Validation("plate cannot be empty".to_string()));
    }

    let vehicle = Vehicle {
        id: Uuid::new_v4(),
        group_id,
        name: payload.name.trim().to_string(),
        plate: payload.plate.trim().to_uppercase(),
        status: payload.status.unwrap_or(VehicleStatus::Active),
        enabled: payload.enabled.unwrap_or(true),
        updated_at: Utc::now(),
    };

    state.fleet.upsert_vehicle(vehicle.clone());
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let mut vehicles = state.fleet.list_vehicles(group_id).await?;
    vehicles.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(vehicles))
}

async fn update_vehicle_status(
    State(state): State<Arc<AppState>>,
    Path((group_id, vehicle_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateVehicleStatusRequest>, JsonRejection>,
) -> Result<Json<Vehicle>, AppError> {
    let payload = json_body(payload)?;
    let not_found = || AppError::NotFound(format!("vehicle {vehicle_id} not found"));

    state
        .fleet
        .get_vehicle(vehicle_id)
        .await?
        .filter(|vehicle| vehicle.group_id == group_id)
        .ok_or_else(not_found)?;

    let vehicle = state
        .fleet
        .set_vehicle_status(vehicle_id, payload.status, payload.enabled)
        .ok_or_else(not_found)?;
    Ok(Json(vehicle))
}
