//! OS-facing side-effect services
//!
//! This module contains the idle-sleep inhibitor and the notification
//! surface, both of which degrade silently when the underlying OS
//! primitive is unavailable.

pub mod notify;
pub mod power;

// Re-export main types
pub use notify::{Acknowledgment, NotificationService};
pub use power::{HoldTag, PowerSaveCoordinator};
