use std::env;
use std::time::Duration;

use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub audit_buffer_size: usize,
    pub operation_timeout: Option<Duration>,
    /// Actor granted every permission in one group at startup.
    pub admin: Option<AdminGrant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminGrant {
    pub actor_id: Uuid,
    pub group_id: Uuid,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let timeout_ms: u64 = parse_or_default("OPERATION_TIMEOUT_MS", 5_000)?;
        let audit_buffer_size =
            validate_buffer_size(parse_or_default("AUDIT_BUFFER_SIZE", 1024)?)?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_log_format(env::var("LOG_FORMAT").ok().as_deref())?,
            audit_buffer_size,
            operation_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            admin: parse_admin_grant(
                env::var("ADMIN_ACTOR_ID").ok().as_deref(),
                env::var("ADMIN_GROUP_ID").ok().as_deref(),
            )?,
        })
    }
}

fn validate_buffer_size(size: usize) -> Result<usize, AppError> {
    if size == 0 {
        return Err(AppError::Internal(
            "invalid AUDIT_BUFFER_SIZE: must be > 0".to_string(),
        ));
    }
    Ok(size)
}

fn parse_admin_grant(
    actor: Option<&str>,
    group: Option<&str>,
) -> Result<Option<AdminGrant>, AppError> {
    let actor = actor.map(str::trim).filter(|raw| !raw.is_empty());
    let group = group.map(str::trim).filter(|raw| !raw.is_empty());
    match (actor, group) {
        (None, None) => Ok(None),
        (Some(actor), Some(group)) => Ok(Some(AdminGrant {
            actor_id: parse_uuid("ADMIN_ACTOR_ID", actor)?,
            group_id: parse_uuid("ADMIN_GROUP_ID", group)?,
        })),
        _ => Err(AppError::Internal(
            "ADMIN_ACTOR_ID and ADMIN_GROUP_ID must be set together".to_string(),
        )),
    }
}

fn parse_uuid(key: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|err| AppError::Internal(format!("invalid {key}: {err}")))
}

fn parse_log_format(raw: Option<&str>) -> Result<LogFormat, AppError> {
    match raw.map(str::trim) {
        None | Some("") | Some("compact") => Ok(LogFormat::Compact),
        Some("json") => Ok(LogFormat::Json),
        Some(other) => Err(AppError::Internal(format!(
            "invalid LOG_FORMAT: {other}, expected compact/json"
        ))),
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
