//! The timer authority: single owner of canonical timer state

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::protocol::{Command, Event};
use crate::services::{HoldTag, NotificationService, PowerSaveCoordinator};
use crate::state::session::{RunState, TimerConfig, TimerSession};

/// Everything guarded by the authority's single serialization point
#[derive(Debug)]
struct Inner {
    session: TimerSession,
    config: TimerConfig,
}

/// Result of one tick evaluation, computed under the session lock
enum TickOutcome {
    Running { remaining: u64 },
    Completed { finished: crate::state::Phase, next_remaining: u64 },
}

/// Single source of truth for elapsed/remaining time.
///
/// All mutation funnels through one mutex so `start`, `pause`, `reset`,
/// and tick evaluation never interleave; callers observe linearizable
/// ordering. Remaining time is recomputed from wall-clock deltas on every
/// read, so the countdown stays correct across process suspension, window
/// minimize/restore, and scheduling delay.
#[derive(Debug)]
pub struct TimerAuthority {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    power: Arc<PowerSaveCoordinator>,
    notifier: Arc<NotificationService>,
    /// Events for attached display surfaces (fire-and-forget)
    event_tx: broadcast::Sender<Event>,
    /// Session snapshots for in-process observers (the tick task)
    session_tx: watch::Sender<TimerSession>,
    /// Keep the receiver alive to prevent channel closure
    _session_rx: watch::Receiver<TimerSession>,
}

impl TimerAuthority {
    pub fn new(
        config: TimerConfig,
        clock: Arc<dyn Clock>,
        power: Arc<PowerSaveCoordinator>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        let session = TimerSession::new(&config);
        let (event_tx, _) = broadcast::channel(256);
        let (session_tx, session_rx) = watch::channel(session.clone());

        Self {
            inner: Mutex::new(Inner { session, config }),
            clock,
            power,
            notifier,
            event_tx,
            session_tx,
            _session_rx: session_rx,
        }
    }

    /// Subscribe to the display-facing event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Subscribe to session snapshots (drives the tick task)
    pub fn subscribe_session(&self) -> watch::Receiver<TimerSession> {
        self.session_tx.subscribe()
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>, String> {
        self.inner
            .lock()
            .map_err(|e| format!("Failed to lock timer session: {}", e))
    }

    /// Apply a wire command from the sync channel
    pub async fn apply(&self, command: Command) -> Result<TimerSession, String> {
        match command {
            Command::Start { remaining_seconds } => self.start(remaining_seconds).await,
            Command::Pause => self.pause().await,
            Command::Reset { total_seconds } => self.reset(total_seconds).await,
            Command::Query => self.query(),
        }
    }

    /// Start or resume the countdown; a no-op while already running
    pub async fn start(&self, requested_remaining: Option<u64>) -> Result<TimerSession, String> {
        let snapshot = {
            let mut inner = self.lock_inner()?;

            if inner.session.is_running() {
                debug!("Start while already running, ignoring");
                return Ok(self.snapshot_of(&inner));
            }

            let total = requested_remaining
                .unwrap_or(inner.session.remaining_seconds)
                .clamp(1, TimerConfig::WORK_MAX_SECONDS);
            inner.session.total_for_phase = total;
            inner.session.remaining_seconds = total;
            inner.session.started_at = Some(self.clock.now());
            inner.session.run_state = RunState::Running;
            inner.session.clone()
        };

        info!(
            "Timer started: {:?} phase, {}s remaining",
            snapshot.phase, snapshot.remaining_seconds
        );
        self.publish(&snapshot);
        self.power.acquire(HoldTag::TimerRunning).await;
        Ok(snapshot)
    }

    /// Freeze the countdown at its current remaining time
    pub async fn pause(&self) -> Result<TimerSession, String> {
        let snapshot = {
            let mut inner = self.lock_inner()?;

            if !inner.session.is_running() {
                debug!("Pause while not running, ignoring");
                return Ok(self.snapshot_of(&inner));
            }

            inner.session.remaining_seconds = inner.session.remaining_at(self.clock.now());
            inner.session.run_state = RunState::Paused;
            inner.session.started_at = None;
            inner.session.clone()
        };

        info!("Timer paused with {}s remaining", snapshot.remaining_seconds);
        self.publish(&snapshot);
        self.power.release(HoldTag::TimerRunning).await;
        Ok(snapshot)
    }

    /// Stop any countdown and re-seed the remaining time; valid from any
    /// state, phase unchanged
    pub async fn reset(&self, new_total_seconds: u64) -> Result<TimerSession, String> {
        let total = new_total_seconds.clamp(1, TimerConfig::WORK_MAX_SECONDS);
        let snapshot = {
            let mut inner = self.lock_inner()?;
            inner.session.run_state = RunState::Idle;
            inner.session.remaining_seconds = total;
            inner.session.total_for_phase = total;
            inner.session.started_at = None;
            inner.session.clone()
        };

        info!("Timer reset to {}s", total);
        self.publish(&snapshot);
        self.power.release(HoldTag::TimerRunning).await;
        Ok(snapshot)
    }

    /// Pure read: recomputes remaining time without mutating the session
    pub fn query(&self) -> Result<TimerSession, String> {
        let inner = self.lock_inner()?;
        Ok(self.snapshot_of(&inner))
    }

    pub fn config(&self) -> Result<TimerConfig, String> {
        Ok(self.lock_inner()?.config)
    }

    /// Update the configured durations.
    ///
    /// Rejected while running. A changed duration re-seeds the countdown
    /// only for an idle session in the matching phase; a paused
    /// mid-countdown keeps its frozen remaining time.
    pub fn set_config(&self, work_seconds: u64, break_seconds: u64) -> Result<TimerConfig, String> {
        let new_config = TimerConfig::clamped(work_seconds, break_seconds);
        let snapshot = {
            let mut inner = self.lock_inner()?;

            if inner.session.is_running() {
                warn!("Config change rejected while timer is running");
                return Ok(inner.config);
            }

            let phase = inner.session.phase;
            let old_duration = inner.config.duration_for(phase);
            inner.config = new_config;

            let new_duration = new_config.duration_for(phase);
            if inner.session.run_state == RunState::Idle && new_duration != old_duration {
                inner.session.total_for_phase = new_duration;
                inner.session.remaining_seconds = new_duration;
                Some(inner.session.clone())
            } else {
                None
            }
        };

        info!(
            "Config updated: work={}s, break={}s",
            new_config.work_seconds, new_config.break_seconds
        );
        if let Some(snapshot) = snapshot {
            self.publish(&snapshot);
        }
        Ok(new_config)
    }

    /// One tick evaluation; returns false when the schedule should stop.
    ///
    /// The zero-crossing is detected from the wall-clock delta (clamped
    /// to 0 before the comparison), and the flip to Idle happens under
    /// the same lock, so the completion fires exactly once per crossing
    /// even when a single evaluation overshoots zero by several seconds.
    pub async fn on_tick(&self) -> Result<bool, String> {
        let (outcome, snapshot) = {
            let mut inner = self.lock_inner()?;

            if !inner.session.is_running() {
                return Ok(false);
            }

            let remaining = inner.session.remaining_at(self.clock.now());
            if remaining > 0 {
                inner.session.remaining_seconds = remaining;
                (TickOutcome::Running { remaining }, inner.session.clone())
            } else {
                // Phase-flip transition. Completed is folded into Idle
                // before the lock drops, so no observer ever sees it.
                inner.session.run_state = RunState::Completed;
                let finished = inner.session.phase;
                inner.session.phase = finished.flipped();
                let next_remaining = inner.config.duration_for(inner.session.phase);
                inner.session.total_for_phase = next_remaining;
                inner.session.remaining_seconds = next_remaining;
                inner.session.started_at = None;
                inner.session.run_state = RunState::Idle;
                (
                    TickOutcome::Completed {
                        finished,
                        next_remaining,
                    },
                    inner.session.clone(),
                )
            }
        };

        match outcome {
            TickOutcome::Running { remaining } => {
                self.emit(Event::Tick {
                    remaining,
                    running: true,
                });
                let _ = self.session_tx.send(snapshot);
                Ok(true)
            }
            TickOutcome::Completed {
                finished,
                next_remaining,
            } => {
                info!(
                    "{:?} phase complete, next phase seeded with {}s",
                    finished, next_remaining
                );
                self.emit(Event::PhaseComplete);
                self.emit(Event::Tick {
                    remaining: next_remaining,
                    running: false,
                });
                let _ = self.session_tx.send(snapshot);
                self.power.release(HoldTag::TimerRunning).await;
                self.notifier.notify_phase_complete(finished).await;
                Ok(false)
            }
        }
    }

    /// Stop everything and drop the power lock unconditionally
    pub async fn shutdown(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.session.is_running() {
                inner.session.remaining_seconds = inner.session.remaining_at(self.clock.now());
                inner.session.run_state = RunState::Paused;
                inner.session.started_at = None;
            }
            let _ = self.session_tx.send(inner.session.clone());
        }

        self.power.release_all().await;
        info!("Timer authority shut down");
    }

    fn snapshot_of(&self, inner: &Inner) -> TimerSession {
        let mut snapshot = inner.session.clone();
        snapshot.remaining_seconds = inner.session.remaining_at(self.clock.now());
        snapshot
    }

    fn publish(&self, snapshot: &TimerSession) {
        self.emit(Event::Tick {
            remaining: snapshot.remaining_seconds,
            running: snapshot.is_running(),
        });
        let _ = self.session_tx.send(snapshot.clone());
    }

    /// Fire-and-forget: a send with no attached display is not an error
    fn emit(&self, event: Event) {
        if self.event_tx.send(event).is_err() {
            debug!("No display attached, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::state::Phase;

    struct Harness {
        authority: Arc<TimerAuthority>,
        clock: Arc<ManualClock>,
        power: Arc<PowerSaveCoordinator>,
    }

    fn harness(work_seconds: u64, break_seconds: u64) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let power = Arc::new(PowerSaveCoordinator::accounting_only());
        let notifier = Arc::new(NotificationService::new(None));
        let authority = Arc::new(TimerAuthority::new(
            TimerConfig::clamped(work_seconds, break_seconds),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&power),
            notifier,
        ));
        Harness {
            authority,
            clock,
            power,
        }
    }

    fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn completions(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::PhaseComplete))
            .count()
    }

    #[tokio::test]
    async fn no_drift_regardless_of_tick_cadence() {
        let h = harness(1500, 300);
        h.authority.start(None).await.unwrap();

        // Ticks without elapsed wall time must not decrement anything.
        for _ in 0..5 {
            h.authority.on_tick().await.unwrap();
        }
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 1500);

        h.clock.advance_secs(10);
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 1490);

        // A burst of ticks after the advance changes nothing further.
        for _ in 0..3 {
            h.authority.on_tick().await.unwrap();
        }
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 1490);
    }

    #[tokio::test]
    async fn pause_resume_is_additive() {
        let h = harness(1500, 300);
        h.authority.start(None).await.unwrap();
        h.clock.advance_secs(100);
        h.authority.pause().await.unwrap();

        // Idle wall time while paused must not count.
        h.clock.advance_secs(9999);
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 1400);

        h.authority.start(None).await.unwrap();
        h.clock.advance_secs(50);
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 1350);
    }

    #[tokio::test]
    async fn second_start_is_a_noop() {
        let h = harness(1500, 300);
        h.authority.start(None).await.unwrap();
        h.clock.advance_secs(5);

        // Must not re-acquire started_at or re-seed the total.
        h.authority.start(Some(60)).await.unwrap();
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 1495);
    }

    #[tokio::test]
    async fn start_accepts_a_requested_remaining() {
        let h = harness(1500, 300);
        h.authority.start(Some(90)).await.unwrap();
        h.clock.advance_secs(30);
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 60);
    }

    #[tokio::test]
    async fn completion_fires_exactly_once_even_on_overshoot() {
        let h = harness(10, 300);
        let mut rx = h.authority.subscribe_events();
        h.authority.start(None).await.unwrap();

        // One evaluation lands far past the zero-crossing.
        h.clock.advance_secs(45);
        assert!(
            !h.authority.on_tick().await.unwrap(),
            "schedule must stop"
        );

        let events = drain_events(&mut rx);
        assert_eq!(completions(&events), 1);
        // PhaseComplete is immediately followed by the new phase's tick.
        let complete_at = events
            .iter()
            .position(|e| matches!(e, Event::PhaseComplete))
            .unwrap();
        assert_eq!(
            events[complete_at + 1],
            Event::Tick {
                remaining: 300,
                running: false
            }
        );

        let session = h.authority.query().unwrap();
        assert_eq!(session.phase, Phase::Break);
        assert_eq!(session.run_state, RunState::Idle);
        assert_eq!(session.remaining_seconds, 300);

        // Further ticks find nothing running and emit nothing.
        assert!(!h.authority.on_tick().await.unwrap());
        assert_eq!(completions(&drain_events(&mut rx)), 0);
    }

    #[tokio::test]
    async fn phases_alternate_work_break_work() {
        let h = harness(1500, 300);
        let mut rx = h.authority.subscribe_events();

        h.authority.start(None).await.unwrap();
        h.clock.advance_secs(1500);
        h.authority.on_tick().await.unwrap();

        let session = h.authority.query().unwrap();
        assert_eq!(session.phase, Phase::Break);
        assert_eq!(session.remaining_seconds, 300);
        assert!(!session.is_running());
        assert_eq!(completions(&drain_events(&mut rx)), 1);

        // Countdown does not auto-resume; a fresh start begins the break.
        h.authority.start(None).await.unwrap();
        h.clock.advance_secs(300);
        h.authority.on_tick().await.unwrap();

        let session = h.authority.query().unwrap();
        assert_eq!(session.phase, Phase::Work);
        assert_eq!(session.remaining_seconds, 1500);
        assert!(!session.is_running());
        assert_eq!(completions(&drain_events(&mut rx)), 1);
    }

    #[tokio::test]
    async fn reset_is_idempotent_from_any_state() {
        let h = harness(1500, 300);
        h.authority.start(None).await.unwrap();
        h.clock.advance_secs(200);

        h.authority.reset(600).await.unwrap();
        let session = h.authority.query().unwrap();
        assert_eq!(session.run_state, RunState::Idle);
        assert_eq!(session.remaining_seconds, 600);
        assert_eq!(session.phase, Phase::Work);

        // A second reset is equivalent to one.
        h.authority.reset(600).await.unwrap();
        let session = h.authority.query().unwrap();
        assert_eq!(session.run_state, RunState::Idle);
        assert_eq!(session.remaining_seconds, 600);

        // A stale pause after the reset is resolved by idempotency.
        h.authority.pause().await.unwrap();
        assert_eq!(h.authority.query().unwrap().run_state, RunState::Idle);
    }

    #[tokio::test]
    async fn power_hold_follows_the_running_state() {
        let h = harness(1500, 300);
        assert!(!h.power.is_held().await);

        h.authority.start(None).await.unwrap();
        assert!(h.power.is_held().await);

        h.authority.pause().await.unwrap();
        assert!(!h.power.is_held().await);

        // Another holder keeps the lock across a timer release.
        h.power.acquire(HoldTag::WindowMinimized).await;
        h.authority.start(None).await.unwrap();
        h.authority.pause().await.unwrap();
        assert!(h.power.is_held().await);
    }

    #[tokio::test]
    async fn completion_releases_the_timer_power_hold() {
        let h = harness(5, 300);
        h.authority.start(None).await.unwrap();
        assert!(h.power.is_held().await);

        h.clock.advance_secs(5);
        h.authority.on_tick().await.unwrap();
        assert!(!h.power.is_held().await);
    }

    #[tokio::test]
    async fn config_change_rejected_while_running() {
        let h = harness(1500, 300);
        h.authority.start(None).await.unwrap();
        let config = h.authority.set_config(600, 120).unwrap();
        assert_eq!(config.work_seconds, 1500);
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 1500);
    }

    #[tokio::test]
    async fn config_change_reseeds_only_an_idle_matching_phase() {
        let h = harness(1500, 300);

        // Idle in Work: new work duration re-seeds the countdown.
        h.authority.set_config(600, 300).unwrap();
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 600);

        // Paused mid-countdown: frozen progress is kept.
        h.authority.start(None).await.unwrap();
        h.clock.advance_secs(100);
        h.authority.pause().await.unwrap();
        h.authority.set_config(900, 300).unwrap();
        assert_eq!(h.authority.query().unwrap().remaining_seconds, 500);
    }

    #[tokio::test]
    async fn defensive_clamping_at_the_authority() {
        let h = harness(1500, 300);
        h.authority.reset(1_000_000).await.unwrap();
        assert_eq!(
            h.authority.query().unwrap().remaining_seconds,
            TimerConfig::WORK_MAX_SECONDS
        );

        let config = h.authority.set_config(0, 1_000_000).unwrap();
        assert_eq!(config.work_seconds, 1);
        assert_eq!(config.break_seconds, TimerConfig::BREAK_MAX_SECONDS);
    }

    #[tokio::test]
    async fn wire_commands_dispatch_to_the_same_operations() {
        let h = harness(1500, 300);
        h.authority
            .apply(Command::Start {
                remaining_seconds: None,
            })
            .await
            .unwrap();
        h.clock.advance_secs(10);
        h.authority.apply(Command::Pause).await.unwrap();

        let session = h.authority.apply(Command::Query).await.unwrap();
        assert_eq!(session.remaining_seconds, 1490);
        assert_eq!(session.run_state, RunState::Paused);

        let session = h
            .authority
            .apply(Command::Reset { total_seconds: 60 })
            .await
            .unwrap();
        assert_eq!(session.remaining_seconds, 60);
        assert_eq!(session.run_state, RunState::Idle);
    }

    #[tokio::test]
    async fn shutdown_releases_power_unconditionally() {
        let h = harness(1500, 300);
        h.authority.start(None).await.unwrap();
        h.power.acquire(HoldTag::WindowMinimized).await;

        h.authority.shutdown().await;
        assert!(!h.power.is_held().await);
    }
}
