//! Wall-clock access behind a trait so tests can drive time by hand

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
///
/// Remaining time is always recomputed from wall-clock deltas rather than
/// counted down tick by tick, so this is the only place time enters the
/// timer logic.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whole elapsed seconds between two timestamps, floor-rounded.
///
/// Clamped to 0 when `t1 < t0` (e.g. the system clock was adjusted
/// backwards mid-countdown).
pub fn elapsed_seconds(t0: DateTime<Utc>, t1: DateTime<Utc>) -> u64 {
    let secs = (t1 - t0).num_seconds();
    if secs < 0 {
        0
    } else {
        secs as u64
    }
}

#[cfg(test)]
pub use test_clock::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn elapsed_is_floor_rounded() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::milliseconds(1999);
        assert_eq!(elapsed_seconds(t0, t1), 1);
    }

    #[test]
    fn elapsed_clamps_backwards_clock_to_zero() {
        let t0 = Utc::now();
        let t1 = t0 - Duration::seconds(30);
        assert_eq!(elapsed_seconds(t0, t1), 0);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance_secs(90);
        assert_eq!(elapsed_seconds(t0, clock.now()), 90);
    }
}
