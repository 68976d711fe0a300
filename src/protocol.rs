//! Wire types for the display <-> authority sync channel
//!
//! Commands flow display -> authority, events flow authority -> display.
//! Delivery is fire-and-forget and at-most-once per logical event: there
//! is no replay on reconnect, so a freshly attached display must issue
//! `Command::Query` to resynchronize instead of relying on buffered
//! history.

use serde::{Deserialize, Serialize};

/// Commands the display surface sends to the timer authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start or resume the countdown, optionally overriding the
    /// remaining time it counts down from
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remaining_seconds: Option<u64>,
    },
    /// Freeze the countdown at its current remaining time
    Pause,
    /// Stop any countdown and re-seed the remaining time
    Reset { total_seconds: u64 },
    /// Request a state snapshot (the resync path for a fresh display)
    Query,
}

/// Events the authority pushes to attached display surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Emitted once per second while running, and once after every
    /// state-changing command so displays repaint promptly
    Tick { remaining: u64, running: bool },
    /// Emitted exactly once per zero-crossing, immediately followed by a
    /// `Tick` carrying the new phase's full duration with `running: false`
    PhaseComplete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_tag_by_type() {
        let json = serde_json::to_string(&Command::Reset { total_seconds: 300 }).unwrap();
        assert_eq!(json, r#"{"type":"reset","total_seconds":300}"#);

        let cmd: Command = serde_json::from_str(r#"{"type":"start"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Start {
                remaining_seconds: None
            }
        );
    }

    #[test]
    fn tick_round_trips() {
        let json = serde_json::to_string(&Event::Tick {
            remaining: 1500,
            running: true,
        })
        .unwrap();
        let event: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(
            event,
            Event::Tick {
                remaining: 1500,
                running: true
            }
        );
    }
}
