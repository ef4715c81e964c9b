pub mod assignments;
pub mod fleet;
pub mod ws;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::{Permission, PermissionCheck};
use crate::error::AppError;
use crate::state::AppState;

pub const ACTOR_HEADER: &str = "x-actor-id";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(assignments::router())
        .merge(fleet::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/groups/:group_id/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Resolves the acting user and checks one permission in the group.
pub(crate) async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    group_id: Uuid,
    permission: Permission,
) -> Result<Uuid, AppError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {ACTOR_HEADER} header")))?;
    let actor_id = raw
        .to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("malformed {ACTOR_HEADER} header")))?;

    if !state
        .permissions
        .is_authorized(actor_id, group_id, permission)
        .await
    {
        return Err(AppError::Forbidden(format!(
            "actor {actor_id} lacks {} in group {group_id}",
            permission.key()
        )));
    }

    Ok(actor_id)
}

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    assignments: usize,
    drivers: usize,
    vehicles: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        assignments: state.assignments.len(),
        drivers: state.fleet.driver_count(),
        vehicles: state.fleet.vehicle_count(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
