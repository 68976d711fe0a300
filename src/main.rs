//! Tomatod - the single timer authority for a desktop Pomodoro app
//!
//! This is the main entry point for the tomatod daemon.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use tomatod::{
    api::{create_router, ApiState},
    clock::SystemClock,
    config::Config,
    services::{NotificationService, PowerSaveCoordinator},
    state::TimerAuthority,
    tasks::tick_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("tomatod={},tower_http=info", config.log_level()))
        .init();

    info!("Starting tomatod v{}", env!("CARGO_PKG_VERSION"));
    let timer_config = config.timer_config();
    info!(
        "Configuration: host={}, port={}, work={}s, break={}s",
        config.host, config.port, timer_config.work_seconds, timer_config.break_seconds
    );

    let power = Arc::new(PowerSaveCoordinator::new());
    let notifier = Arc::new(NotificationService::new(config.sound_file.clone()));
    notifier.probe_availability().await;

    let authority = Arc::new(TimerAuthority::new(
        timer_config,
        Arc::new(SystemClock),
        Arc::clone(&power),
        Arc::clone(&notifier),
    ));

    // Start the tick background task
    let ticker_authority = Arc::clone(&authority);
    tokio::spawn(async move {
        tick_task(ticker_authority).await;
    });

    // Create HTTP router with all endpoints
    let state = Arc::new(ApiState::new(
        Arc::clone(&authority),
        Arc::clone(&power),
        notifier,
    ));
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Authority listening on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /start            - Start or resume the countdown");
    info!("  POST /pause            - Freeze the countdown");
    info!("  POST /reset            - Stop and re-seed the countdown");
    info!("  GET  /state            - Query a full snapshot (resync)");
    info!("  GET  /events           - Tick/completion event stream (SSE)");
    info!("  POST /config           - Update work/break durations");
    info!("  POST /window/minimized - Report display window minimized");
    info!("  POST /window/restored  - Report display window restored");
    info!("  POST /alert/ack        - Acknowledge the completion alert");
    info!("  GET  /health           - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // The power lock is dropped unconditionally, whatever state the
    // countdown was in.
    authority.shutdown().await;

    info!("Authority shutdown complete");
    Ok(())
}
