//! Display-side reflector of authority snapshots

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::protocol::{Command, Event};
use crate::state::{Phase, RunState, TimerSession};

/// Last snapshot received from the authority, pinned to receive time so
/// the display can extrapolate between ticks
#[derive(Debug, Clone)]
struct SnapshotView {
    remaining: u64,
    running: bool,
    received_at: DateTime<Utc>,
}

/// Passive, re-renderable view of the authority's timer state.
///
/// While an authority is reachable the mirror reflects the last snapshot
/// it received and extrapolates with the same wall-clock formula the
/// authority uses. When the connection is lost it degrades to a local
/// best-effort countdown seeded from that snapshot, with no power-save
/// integration and no cross-process durability. Events may be lost or
/// gapped; a freshly attached mirror resynchronizes with `Command::Query`
/// instead of relying on buffered history.
#[derive(Debug)]
pub struct DisplayMirror {
    clock: Arc<dyn Clock>,
    last: Option<SnapshotView>,
    /// Known from the last resync, flipped on each completion event.
    /// Ticks do not carry it, so it is None until the first resync.
    phase: Option<Phase>,
    /// Present while detached from the authority
    fallback: Option<TimerSession>,
    phase_completed: bool,
}

impl DisplayMirror {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: None,
            phase: None,
            fallback: None,
            phase_completed: false,
        }
    }

    /// A fresh or reattached mirror has nothing to render until it has
    /// resynchronized
    pub fn needs_resync(&self) -> bool {
        self.last.is_none() && self.fallback.is_none()
    }

    /// The command a reattaching display issues to resynchronize
    pub fn resync_command(&self) -> Command {
        Command::Query
    }

    /// Fold one authority event into the view
    pub fn observe(&mut self, event: &Event) {
        if self.fallback.take().is_some() {
            info!("Authority reachable again, dropping local fallback");
        }
        match event {
            Event::Tick { remaining, running } => {
                self.last = Some(SnapshotView {
                    remaining: *remaining,
                    running: *running,
                    received_at: self.clock.now(),
                });
            }
            Event::PhaseComplete => {
                self.phase = self.phase.map(Phase::flipped);
                self.phase_completed = true;
            }
        }
    }

    /// Seed the view from a full query snapshot
    pub fn resync(&mut self, session: &TimerSession) {
        self.fallback = None;
        self.phase = Some(session.phase);
        self.last = Some(SnapshotView {
            remaining: session.remaining_seconds,
            running: session.is_running(),
            received_at: self.clock.now(),
        });
        debug!("Mirror resynchronized: {}s remaining", session.remaining_seconds);
    }

    /// One-shot flag for the render layer to flash the phase change
    pub fn take_phase_complete(&mut self) -> bool {
        std::mem::take(&mut self.phase_completed)
    }

    /// Switch to the local best-effort countdown, seeded from the last
    /// snapshot
    pub fn connection_lost(&mut self) {
        if self.fallback.is_some() {
            return;
        }
        info!("Authority unreachable, falling back to local countdown");

        let now = self.clock.now();
        let (remaining, running) = match &self.last {
            Some(view) => (self.view_remaining(view, now), view.running),
            None => (0, false),
        };

        let mut session = TimerSession {
            phase: self.phase.unwrap_or(Phase::Work),
            run_state: RunState::Idle,
            remaining_seconds: remaining,
            started_at: None,
            total_for_phase: remaining,
        };
        if running {
            session.run_state = RunState::Running;
            session.started_at = Some(now);
        }
        self.fallback = Some(session);
        self.last = None;
    }

    /// Remaining seconds as the display should render them right now
    pub fn remaining(&self) -> u64 {
        let now = self.clock.now();
        if let Some(session) = &self.fallback {
            return session.remaining_at(now);
        }
        match &self.last {
            Some(view) => self.view_remaining(view, now),
            None => 0,
        }
    }

    /// The phase to label the countdown with; None until the first resync
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        if let Some(session) = &self.fallback {
            return session.is_running();
        }
        self.last.as_ref().map(|v| v.running).unwrap_or(false)
    }

    /// Local controls, only meaningful while detached
    pub fn local_start(&mut self) {
        let Some(session) = self.fallback.as_mut() else {
            return;
        };
        if session.is_running() {
            return;
        }
        session.total_for_phase = session.remaining_seconds;
        session.started_at = Some(self.clock.now());
        session.run_state = RunState::Running;
    }

    pub fn local_pause(&mut self) {
        let now = self.clock.now();
        let Some(session) = self.fallback.as_mut() else {
            return;
        };
        if !session.is_running() {
            return;
        }
        session.remaining_seconds = session.remaining_at(now);
        session.started_at = None;
        session.run_state = RunState::Paused;
    }

    pub fn local_reset(&mut self, total_seconds: u64) {
        let Some(session) = self.fallback.as_mut() else {
            return;
        };
        session.remaining_seconds = total_seconds;
        session.total_for_phase = total_seconds;
        session.started_at = None;
        session.run_state = RunState::Idle;
    }

    fn view_remaining(&self, view: &SnapshotView, now: DateTime<Utc>) -> u64 {
        if view.running {
            view.remaining
                .saturating_sub(crate::clock::elapsed_seconds(view.received_at, now))
        } else {
            view.remaining
        }
    }
}
