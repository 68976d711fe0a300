//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Phase, RunState, TimerConfig, TimerSession};

/// Externally visible session snapshot.
///
/// `RunState::Completed` never appears here: the authority folds it into
/// the phase flip before any snapshot is taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub phase: Phase,
    pub run_state: RunState,
    pub remaining_seconds: u64,
    pub running: bool,
}

impl From<TimerSession> for SessionView {
    fn from(session: TimerSession) -> Self {
        Self {
            phase: session.phase,
            run_state: session.run_state,
            remaining_seconds: session.remaining_seconds,
            running: session.is_running(),
        }
    }
}

/// Response for command endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub session: SessionView,
}

impl CommandResponse {
    pub fn ok(message: String, session: TimerSession) -> Self {
        Self {
            status: "ok".to_string(),
            message,
            timestamp: Utc::now(),
            session: session.into(),
        }
    }
}

/// Full state snapshot for `GET /state` (the query/resync path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub session: SessionView,
    pub config: TimerConfig,
    pub power_held: bool,
    pub alert_active: bool,
    pub uptime: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body for `POST /start`; omitting the body starts from the current
/// remaining time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub remaining_seconds: Option<u64>,
}

/// Body for `POST /reset`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequest {
    pub total_seconds: u64,
}

/// Body for `POST /config`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub work_seconds: u64,
    pub break_seconds: u64,
}

/// Body for `POST /alert/ack`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckRequest {
    pub by: AckBy,
}

/// User-driven acknowledgment paths (the timeout path is internal)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckBy {
    Click,
    Close,
}
