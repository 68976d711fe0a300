//! Tomatod - the single timer authority for a desktop Pomodoro app
//!
//! This library owns canonical Pomodoro timer state and exposes the sync
//! channel a detached display surface uses to command it and mirror it.

pub mod api;
pub mod clock;
pub mod config;
pub mod mirror;
pub mod protocol;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use mirror::DisplayMirror;
pub use state::TimerAuthority;
pub use utils::signals::shutdown_signal;
