//! Timer state module
//!
//! This module contains the canonical timer state structures and the
//! authority that owns them.

pub mod authority;
pub mod session;

// Re-export main types
pub use authority::TimerAuthority;
pub use session::{Phase, RunState, TimerConfig, TimerSession};
