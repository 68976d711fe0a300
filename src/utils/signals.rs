//! Signal handling for graceful shutdown

use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tracing::info;

/// Wait for SIGTERM or SIGINT.
///
/// Resolving is the cue to stop the countdown and drop the power lock;
/// the authority's shutdown path runs after this returns.
pub async fn shutdown_signal() {
    let mut signals = Signals::new([SIGTERM, SIGINT]).expect("Failed to create signal handler");

    if let Some(signal) = signals.next().await {
        let name = match signal {
            SIGTERM => "SIGTERM",
            SIGINT => "SIGINT",
            _ => "unexpected signal",
        };
        info!("Received {}, stopping the timer authority", name);
    }
}
