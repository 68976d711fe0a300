//! Timer session structures: phase, run state, durations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::elapsed_seconds;

/// Which configured duration governs the current countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    Break,
}

impl Phase {
    /// The phase the timer flips into after a zero-crossing
    pub fn flipped(self) -> Self {
        match self {
            Phase::Work => Phase::Break,
            Phase::Break => Phase::Work,
        }
    }
}

/// Whether the countdown is decrementing, frozen, or waiting to start.
///
/// `Completed` is transient: the authority folds it into a phase flip
/// within the same tick evaluation, so no snapshot ever carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Configured work/break durations, clamped to their valid ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub work_seconds: u64,
    pub break_seconds: u64,
}

impl TimerConfig {
    pub const WORK_MAX_SECONDS: u64 = 3600;
    pub const BREAK_MAX_SECONDS: u64 = 1800;

    /// Build a config, clamping each duration into its valid range
    pub fn clamped(work_seconds: u64, break_seconds: u64) -> Self {
        Self {
            work_seconds: work_seconds.clamp(1, Self::WORK_MAX_SECONDS),
            break_seconds: break_seconds.clamp(1, Self::BREAK_MAX_SECONDS),
        }
    }

    /// The configured duration for the given phase
    pub fn duration_for(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Work => self.work_seconds,
            Phase::Break => self.break_seconds,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_seconds: 25 * 60,
            break_seconds: 5 * 60,
        }
    }
}

/// Canonical timer state, owned exclusively by the authority.
///
/// Invariant: while `Running`, the observable remaining time is
/// `max(0, total_for_phase - elapsed(started_at, now))`; everywhere else
/// `remaining_seconds` is the value frozen at the last pause, reset, or
/// completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSession {
    pub phase: Phase,
    pub run_state: RunState,
    pub remaining_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub total_for_phase: u64,
}

impl TimerSession {
    /// Fresh session: idle at the start of a work phase
    pub fn new(config: &TimerConfig) -> Self {
        Self {
            phase: Phase::Work,
            run_state: RunState::Idle,
            remaining_seconds: config.work_seconds,
            started_at: None,
            total_for_phase: config.work_seconds,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Remaining seconds as of `now`, without mutating anything
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        match self.started_at {
            Some(t0) if self.is_running() => {
                self.total_for_phase
                    .saturating_sub(elapsed_seconds(t0, now))
            }
            _ => self.remaining_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn config_clamps_out_of_range_durations() {
        let config = TimerConfig::clamped(0, 99_999);
        assert_eq!(config.work_seconds, 1);
        assert_eq!(config.break_seconds, TimerConfig::BREAK_MAX_SECONDS);
    }

    #[test]
    fn phase_alternates() {
        assert_eq!(Phase::Work.flipped(), Phase::Break);
        assert_eq!(Phase::Break.flipped().flipped(), Phase::Break);
    }

    #[test]
    fn remaining_saturates_at_zero_on_overshoot() {
        let config = TimerConfig::clamped(10, 300);
        let mut session = TimerSession::new(&config);
        let t0 = Utc::now();
        session.run_state = RunState::Running;
        session.started_at = Some(t0);

        // A single evaluation far past the zero-crossing must clamp, not wrap.
        assert_eq!(session.remaining_at(t0 + Duration::seconds(45)), 0);
        assert_eq!(session.remaining_at(t0 + Duration::seconds(4)), 6);
    }

    #[test]
    fn frozen_remaining_ignores_the_clock() {
        let config = TimerConfig::default();
        let session = TimerSession::new(&config);
        let later = Utc::now() + Duration::seconds(500);
        assert_eq!(session.remaining_at(later), config.work_seconds);
    }
}
