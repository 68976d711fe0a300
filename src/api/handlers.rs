//! HTTP endpoint handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::Json,
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{error, info, warn};

use super::responses::{
    AckBy, AckRequest, CommandResponse, ConfigRequest, HealthResponse, ResetRequest,
    StartRequest, StateResponse,
};
use super::ApiState;
use crate::protocol::Command;
use crate::services::{Acknowledgment, HoldTag};
use crate::state::TimerConfig;

/// Handle POST /start - Start or resume the countdown
pub async fn start_handler(
    State(state): State<Arc<ApiState>>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<CommandResponse>, StatusCode> {
    let remaining_seconds = body.and_then(|Json(req)| req.remaining_seconds);

    match state.authority.apply(Command::Start { remaining_seconds }).await {
        Ok(session) => {
            info!("Start endpoint called");
            Ok(Json(CommandResponse::ok("Timer started".to_string(), session)))
        }
        Err(e) => {
            error!("Failed to start timer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /pause - Freeze the countdown
pub async fn pause_handler(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CommandResponse>, StatusCode> {
    match state.authority.apply(Command::Pause).await {
        Ok(session) => {
            info!("Pause endpoint called");
            Ok(Json(CommandResponse::ok("Timer paused".to_string(), session)))
        }
        Err(e) => {
            error!("Failed to pause timer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /reset - Stop and re-seed the countdown
pub async fn reset_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<CommandResponse>, StatusCode> {
    // Boundary clamp; the authority clamps again defensively.
    let total_seconds = req.total_seconds.clamp(1, TimerConfig::WORK_MAX_SECONDS);
    if total_seconds != req.total_seconds {
        warn!(
            "Reset duration {}s out of range, clamped to {}s",
            req.total_seconds, total_seconds
        );
    }

    match state.authority.apply(Command::Reset { total_seconds }).await {
        Ok(session) => {
            info!("Reset endpoint called");
            Ok(Json(CommandResponse::ok("Timer reset".to_string(), session)))
        }
        Err(e) => {
            error!("Failed to reset timer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle GET /state - Query a full state snapshot (the resync path)
pub async fn state_handler(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<StateResponse>, StatusCode> {
    let session = match state.authority.apply(Command::Query).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to query timer state: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let config = match state.authority.config() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to read timer config: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Ok(Json(StateResponse {
        session: session.into(),
        config,
        power_held: state.power.is_held().await,
        alert_active: state.notifier.alert_active().await,
        uptime: state.uptime(),
    }))
}

/// Handle GET /events - Event stream for attached display surfaces.
///
/// The stream is fed from a broadcast channel and is lossy by
/// construction: a lagged display skips the missed events and is expected
/// to resynchronize via `GET /state`, never via replay.
pub async fn events_handler(
    State(state): State<Arc<ApiState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    info!("Display attached to event stream");

    let stream = BroadcastStream::new(state.authority.subscribe_events()).filter_map(
        |event| async move {
            match event {
                Ok(event) => match SseEvent::default().json_data(&event) {
                    Ok(sse) => Some(Ok(sse)),
                    Err(e) => {
                        warn!("Failed to encode event: {}", e);
                        None
                    }
                },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Display stream lagged, {} events dropped", skipped);
                    None
                }
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle POST /config - Update the configured durations
pub async fn config_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ConfigRequest>,
) -> Result<Json<TimerConfig>, StatusCode> {
    // Boundary clamp before the authority sees the values.
    let clamped = TimerConfig::clamped(req.work_seconds, req.break_seconds);

    match state
        .authority
        .set_config(clamped.work_seconds, clamped.break_seconds)
    {
        Ok(config) => {
            info!("Config endpoint called");
            Ok(Json(config))
        }
        Err(e) => {
            error!("Failed to update config: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /window/minimized - The display window was minimized
pub async fn window_minimized_handler(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CommandResponse>, StatusCode> {
    state.power.acquire(HoldTag::WindowMinimized).await;

    match state.authority.apply(Command::Query).await {
        Ok(session) => {
            info!("Window minimized reported");
            Ok(Json(CommandResponse::ok(
                "Window minimize recorded".to_string(),
                session,
            )))
        }
        Err(e) => {
            error!("Failed to query timer state: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /window/restored - The display window was restored
pub async fn window_restored_handler(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CommandResponse>, StatusCode> {
    state.power.release(HoldTag::WindowMinimized).await;

    match state.authority.apply(Command::Query).await {
        Ok(session) => {
            info!("Window restore reported");
            Ok(Json(CommandResponse::ok(
                "Window restore recorded".to_string(),
                session,
            )))
        }
        Err(e) => {
            error!("Failed to query timer state: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /alert/ack - User acknowledged the phase-completion alert
pub async fn alert_ack_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<AckRequest>,
) -> Result<Json<CommandResponse>, StatusCode> {
    let ack = match req.by {
        AckBy::Click => Acknowledgment::Click,
        AckBy::Close => Acknowledgment::Close,
    };
    state.notifier.acknowledge(ack).await;

    match state.authority.apply(Command::Query).await {
        Ok(session) => {
            info!("Alert acknowledged via {:?}", req.by);
            Ok(Json(CommandResponse::ok(
                "Alert acknowledged".to_string(),
                session,
            )))
        }
        Err(e) => {
            error!("Failed to query timer state: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
