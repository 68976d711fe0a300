//! HTTP sync-channel surface
//!
//! Commands arrive as POST endpoints, snapshots leave over the `/events`
//! server-sent-event stream. This is the only interface the display
//! process talks to.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::{NotificationService, PowerSaveCoordinator};
use crate::state::TimerAuthority;
use handlers::*;

/// Shared state handed to every handler
#[derive(Debug)]
pub struct ApiState {
    pub authority: Arc<TimerAuthority>,
    pub power: Arc<PowerSaveCoordinator>,
    pub notifier: Arc<NotificationService>,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(
        authority: Arc<TimerAuthority>,
        power: Arc<PowerSaveCoordinator>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            authority,
            power,
            notifier,
            start_time: Instant::now(),
        }
    }

    /// Daemon uptime as a formatted string
    pub fn uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/start", post(start_handler))
        .route("/pause", post(pause_handler))
        .route("/reset", post(reset_handler))
        .route("/state", get(state_handler))
        .route("/events", get(events_handler))
        .route("/config", post(config_handler))
        .route("/window/minimized", post(window_minimized_handler))
        .route("/window/restored", post(window_restored_handler))
        .route("/alert/ack", post(alert_ack_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
