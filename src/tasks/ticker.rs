//! Periodic tick background task

use std::{sync::Arc, time::Duration};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::state::TimerAuthority;

/// Background task that drives the authority's tick evaluation.
///
/// Waits for the session to enter the running state, then evaluates one
/// tick per second until the authority reports the schedule should stop
/// (pause, reset, or phase flip) or the session watch flips to
/// not-running. The interval is dropped between runs, so a cancelled
/// schedule never leaks. Remaining time itself comes from wall-clock
/// deltas inside the authority; missed or bunched ticks only affect how
/// often snapshots are emitted, never what they contain.
pub async fn tick_task(authority: Arc<TimerAuthority>) {
    info!("Starting tick task");

    let mut session_rx = authority.subscribe_session();

    loop {
        // Wait for a start command to put the session into Running.
        while !session_rx.borrow().is_running() {
            if session_rx.changed().await.is_err() {
                debug!("Session channel closed, tick task exiting");
                return;
            }
        }

        debug!("Countdown running, tick schedule engaged");
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick fires immediately; skip it so the
        // countdown gets a full second before the first evaluation.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match authority.on_tick().await {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!("Tick schedule stopped");
                            break;
                        }
                        Err(e) => {
                            error!("Tick evaluation failed: {}", e);
                            break;
                        }
                    }
                }

                // Pause or reset cancels the schedule mid-flight.
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        debug!("Session channel closed, tick task exiting");
                        return;
                    }
                    if !session_rx.borrow().is_running() {
                        debug!("Session no longer running, tick schedule cancelled");
                        break;
                    }
                }
            }
        }
    }
}
