//! Idle-sleep prevention, reference-counted over holder tags

use std::collections::HashSet;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A named reason the idle-sleep inhibitor is being kept active.
///
/// The two triggers are independent: the timer may be running while the
/// window is minimized, and either may appear or disappear in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldTag {
    TimerRunning,
    WindowMinimized,
}

#[derive(Debug)]
struct Inner {
    holders: HashSet<HoldTag>,
    /// Held `systemd-inhibit` child; alive iff the OS lock is engaged
    inhibitor: Option<Child>,
}

/// Reference-counted wrapper around the OS idle-sleep inhibitor.
///
/// The OS-level lock is engaged iff the holder set is non-empty; acquire
/// and release are idempotent per tag. When the inhibitor binary is
/// unavailable the coordinator degrades silently: holder accounting keeps
/// working, only idle-sleep prevention is lost. Timer correctness never
/// depends on this service.
#[derive(Debug)]
pub struct PowerSaveCoordinator {
    inner: Mutex<Inner>,
    spawn_inhibitor: bool,
}

impl PowerSaveCoordinator {
    pub fn new() -> Self {
        Self::with_inhibitor(true)
    }

    /// Coordinator that tracks holders without touching the OS (tests,
    /// or platforms without systemd)
    pub fn accounting_only() -> Self {
        Self::with_inhibitor(false)
    }

    fn with_inhibitor(spawn_inhibitor: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                holders: HashSet::new(),
                inhibitor: None,
            }),
            spawn_inhibitor,
        }
    }

    /// Add a holder; engages the OS lock on the empty -> non-empty edge
    pub async fn acquire(&self, tag: HoldTag) {
        let mut inner = self.inner.lock().await;

        if !inner.holders.insert(tag) {
            debug!("Power hold {:?} already acquired, ignoring", tag);
            return;
        }
        info!("Power hold acquired: {:?} (holders: {})", tag, inner.holders.len());

        if inner.inhibitor.is_none() && self.spawn_inhibitor {
            match spawn_inhibitor_process().await {
                Ok(child) => inner.inhibitor = Some(child),
                Err(e) => {
                    // Degrade silently: only idle-sleep prevention is lost.
                    warn!("Idle-sleep inhibitor unavailable: {}", e);
                }
            }
        }
    }

    /// Remove a holder; disengages the OS lock on the non-empty -> empty edge
    pub async fn release(&self, tag: HoldTag) {
        let mut inner = self.inner.lock().await;

        if !inner.holders.remove(&tag) {
            debug!("Power hold {:?} not held, ignoring release", tag);
            return;
        }
        info!("Power hold released: {:?} (holders: {})", tag, inner.holders.len());

        if inner.holders.is_empty() {
            if let Some(child) = inner.inhibitor.take() {
                kill_inhibitor_process(child).await;
            }
        }
    }

    /// Drop every holder and the OS lock, used on daemon shutdown
    pub async fn release_all(&self) {
        let mut inner = self.inner.lock().await;
        inner.holders.clear();
        if let Some(child) = inner.inhibitor.take() {
            kill_inhibitor_process(child).await;
        }
        info!("All power holds released");
    }

    /// Whether the lock is currently requested (holders non-empty)
    pub async fn is_held(&self) -> bool {
        !self.inner.lock().await.holders.is_empty()
    }
}

impl Default for PowerSaveCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a child that holds the systemd idle inhibitor until killed
async fn spawn_inhibitor_process() -> Result<Child, String> {
    debug!("Engaging idle-sleep inhibitor");

    Command::new("systemd-inhibit")
        .args([
            "--what=idle",
            "--who=tomatod",
            "--why=Pomodoro timer active",
            "--mode=block",
            "sleep",
            "infinity",
        ])
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to spawn systemd-inhibit: {}", e))
}

async fn kill_inhibitor_process(mut child: Child) {
    debug!("Disengaging idle-sleep inhibitor");

    if let Err(e) = child.kill().await {
        warn!("Failed to kill inhibitor process: {}", e);
    }
}
