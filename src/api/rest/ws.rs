use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::rest::authorize;
use crate::auth::Permission;
use crate::error::AppError;
use crate::models::audit::AuditEvent;
use crate::state::AppState;

/// Streams the group's audit events to the connected console as JSON text frames.
///
/// The actor is checked before the upgrade is attempted.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let actor_id = authorize(&state, &headers, group_id, Permission::AssignmentsView).await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, group_id, actor_id))
        .into_response())
}

fn visible_in_group(event: &AuditEvent, group_id: Uuid) -> bool {
    event.group_id == group_id
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, group_id: Uuid, actor_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.audit_events_tx.subscribe();

    info!(%group_id, %actor_id, "audit stream client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "audit stream client lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !visible_in_group(&event, group_id) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize audit event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(%group_id, "audit stream client disconnected");
}
