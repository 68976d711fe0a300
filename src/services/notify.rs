//! Phase-completion alerts: OS notification plus looped sound

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::state::Phase;

/// Alerts auto-acknowledge after this long if the user never reacts
const ALERT_TIMEOUT: Duration = Duration::from_secs(30);

/// How an alert session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgment {
    Click,
    Close,
    Timeout,
}

/// Whether the OS notification surface can be used.
///
/// Probed once at startup; while still `Unknown` it is re-probed lazily
/// on the next notification attempt. `Unavailable` degrades every alert
/// to sound-only (or silent) without surfacing an error to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Unknown,
    Available,
    Unavailable,
}

#[derive(Debug)]
struct AlertSession {
    active: bool,
    acknowledged_by: Option<Acknowledgment>,
    /// Distinguishes the current alert from superseded ones so a stale
    /// 30 s timeout cannot acknowledge a newer alert
    generation: u64,
    sound_stop: Option<watch::Sender<bool>>,
}

/// Surfaces phase completions to the user and manages the alert loop.
///
/// At most one alert session is active at a time; raising a new one
/// implicitly closes the prior one without waiting for acknowledgment.
#[derive(Debug)]
pub struct NotificationService {
    sound_file: Option<PathBuf>,
    alert: Arc<Mutex<AlertSession>>,
    availability: Mutex<Availability>,
}

impl NotificationService {
    pub fn new(sound_file: Option<PathBuf>) -> Self {
        Self {
            sound_file,
            alert: Arc::new(Mutex::new(AlertSession {
                active: false,
                acknowledged_by: None,
                generation: 0,
                sound_stop: None,
            })),
            availability: Mutex::new(Availability::Unknown),
        }
    }

    /// Probe the notification surface once at startup
    pub async fn probe_availability(&self) {
        let available = check_notify_send_available().await;
        let mut availability = self.availability.lock().await;
        *availability = if available {
            info!("Notification surface available");
            Availability::Available
        } else {
            warn!("notify-send not available, alerts degrade to sound only");
            Availability::Unavailable
        };
    }

    /// Raise an alert for a completed phase.
    ///
    /// Never returns an error: a missing notification surface or sound
    /// player degrades the alert, it does not fault the timer.
    pub async fn notify_phase_complete(&self, completed: Phase) {
        let generation = {
            let mut alert = self.alert.lock().await;

            // Supersede any alert still waiting for acknowledgment.
            if alert.active {
                debug!("Superseding active alert session");
                stop_sound(&mut alert);
                alert.active = false;
            }

            alert.generation += 1;
            alert.active = true;
            alert.acknowledged_by = None;

            if let Some(file) = &self.sound_file {
                let (stop_tx, stop_rx) = watch::channel(false);
                alert.sound_stop = Some(stop_tx);
                tokio::spawn(sound_loop(file.clone(), stop_rx));
            }

            alert.generation
        };

        let (summary, body) = match completed {
            Phase::Work => ("Work session complete", "Time for a break!"),
            Phase::Break => ("Break complete", "Back to work!"),
        };
        self.send_notification(summary, body).await;

        // Arm the auto-acknowledge timeout for this session only.
        let alert_handle = Arc::clone(&self.alert);
        tokio::spawn(async move {
            sleep(ALERT_TIMEOUT).await;
            timeout_acknowledge(&alert_handle, generation).await;
        });

        info!("Alert raised for completed {:?} phase", completed);
    }

    /// Acknowledge the active alert; a no-op when none is active
    pub async fn acknowledge(&self, ack: Acknowledgment) {
        let mut alert = self.alert.lock().await;
        if !alert.active {
            debug!("Acknowledgment {:?} with no active alert, ignoring", ack);
            return;
        }
        stop_sound(&mut alert);
        alert.active = false;
        alert.acknowledged_by = Some(ack);
        info!("Alert acknowledged via {:?}", ack);
    }

    pub async fn alert_active(&self) -> bool {
        self.alert.lock().await.active
    }

    async fn send_notification(&self, summary: &str, body: &str) {
        let mut availability = self.availability.lock().await;

        // Lazy re-probe while the startup check has not settled.
        if *availability == Availability::Unknown {
            *availability = if check_notify_send_available().await {
                Availability::Available
            } else {
                Availability::Unavailable
            };
        }
        if *availability != Availability::Available {
            debug!("Notification surface unavailable, skipping notification");
            return;
        }
        drop(availability);

        let result = Command::new("notify-send")
            .args(["--app-name=tomatod", summary, body])
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {
                debug!("Notification sent: {}", summary);
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("notify-send failed: {}", stderr);
            }
            Err(e) => {
                warn!("Failed to execute notify-send: {}", e);
                *self.availability.lock().await = Availability::Unavailable;
            }
        }
    }
}

/// Timeout path: only acknowledges the session it was armed for
async fn timeout_acknowledge(alert: &Arc<Mutex<AlertSession>>, generation: u64) {
    let mut alert = alert.lock().await;
    if !alert.active || alert.generation != generation {
        return;
    }
    stop_sound(&mut alert);
    alert.active = false;
    alert.acknowledged_by = Some(Acknowledgment::Timeout);
    info!("Alert acknowledged via {:?}", Acknowledgment::Timeout);
}

fn stop_sound(alert: &mut AlertSession) {
    if let Some(stop_tx) = alert.sound_stop.take() {
        let _ = stop_tx.send(true);
    }
}

/// Check if notify-send is available on the system
async fn check_notify_send_available() -> bool {
    Command::new("notify-send")
        .arg("--version")
        .output()
        .await
        .is_ok()
}

/// Play the alert sound on a loop until told to stop
async fn sound_loop(file: PathBuf, stop_rx: watch::Receiver<bool>) {
    play_until_stopped("paplay", file, stop_rx).await
}

/// Replay the sound until the stop signal fires.
///
/// A player that exits with failure (missing file, no audio server) ends
/// the loop instead of respawning it; the alert degrades to silent.
async fn play_until_stopped(player: &str, file: PathBuf, mut stop_rx: watch::Receiver<bool>) {
    loop {
        let mut child = match Command::new(player)
            .arg(&file)
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start sound playback: {}", e);
                return;
            }
        };

        tokio::select! {
            status = child.wait() => {
                match status {
                    // Finished playing cleanly, replay until acknowledged.
                    Ok(status) if status.success() => {}
                    Ok(status) => {
                        warn!("Sound player exited with {}, stopping playback", status);
                        return;
                    }
                    Err(e) => {
                        warn!("Sound playback failed: {}", e);
                        return;
                    }
                }
            }
            _ = stop_rx.changed() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop sound playback: {}", e);
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> NotificationService {
        let service = NotificationService::new(None);
        // Pin availability so tests never shell out.
        *service.availability.try_lock().unwrap() = Availability::Unavailable;
        service
    }

    #[tokio::test]
    async fn acknowledge_without_alert_is_a_noop() {
        let service = service();
        service.acknowledge(Acknowledgment::Click).await;
        assert!(!service.alert_active().await);
    }

    #[tokio::test]
    async fn new_alert_supersedes_the_active_one() {
        let service = service();
        service.notify_phase_complete(Phase::Work).await;
        assert!(service.alert_active().await);

        service.notify_phase_complete(Phase::Break).await;
        assert!(service.alert_active().await);

        service.acknowledge(Acknowledgment::Close).await;
        assert!(!service.alert_active().await);
        assert_eq!(
            service.alert.lock().await.acknowledged_by,
            Some(Acknowledgment::Close)
        );
    }

    #[tokio::test]
    async fn timeout_acknowledges_the_session_it_was_armed_for() {
        let service = service();
        service.notify_phase_complete(Phase::Work).await;

        let generation = service.alert.lock().await.generation;
        timeout_acknowledge(&service.alert, generation).await;

        assert!(!service.alert_active().await);
        assert_eq!(
            service.alert.lock().await.acknowledged_by,
            Some(Acknowledgment::Timeout)
        );
    }

    #[tokio::test]
    async fn failing_sound_player_ends_the_loop_instead_of_respawning() {
        let (_stop_tx, stop_rx) = watch::channel(false);

        // A player that always fails must end the loop on its first exit;
        // respawning it would fork continuously until the 30 s timeout.
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            play_until_stopped("false", PathBuf::from("alert.wav"), stop_rx),
        )
        .await;
        assert!(result.is_ok(), "loop must stop after a failed playback");
    }

    #[tokio::test]
    async fn stop_signal_ends_sound_playback() {
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            play_until_stopped("sleep", PathBuf::from("30"), stop_rx),
        )
        .await;
        assert!(result.is_ok(), "loop must stop once acknowledged");
    }

    #[tokio::test]
    async fn stale_timeout_cannot_acknowledge_a_newer_alert() {
        let service = service();
        service.notify_phase_complete(Phase::Work).await;
        let stale_generation = service.alert.lock().await.generation;

        service.notify_phase_complete(Phase::Break).await;
        timeout_acknowledge(&service.alert, stale_generation).await;

        assert!(service.alert_active().await, "newer alert must survive");
    }
}
