use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use fleet_assignments::api;
use fleet_assignments::config::{Config, LogFormat};
use fleet_assignments::error::AppError;
use fleet_assignments::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    if config.admin.is_none() {
        tracing::warn!("ADMIN_ACTOR_ID/ADMIN_GROUP_ID not set, every request will be forbidden");
    }
    let shared_state = Arc::new(AppState::from_config(&config));

    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        operation_timeout_ms = config.operation_timeout.map(|limit| limit.as_millis() as u64),
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
