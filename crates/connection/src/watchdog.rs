//! Application-level stall detection.
//!
//! A link can stay open at the TCP/WebSocket level while the server has
//! stopped sending progress. The [`Watchdog`] polls the time since the last
//! inbound frame and reports a [`Stall`] when it exceeds the threshold; the
//! owner reacts by forcing a reconnect. It never touches the transport
//! itself, so all state changes stay with its owner.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::WatchdogConfig;

/// Reported when nothing arrived for longer than the stall threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stall {
    pub silent_for: Duration,
}

/// Running stall detector. Stops on [`stop`](Self::stop) or drop.
pub struct Watchdog {
    last_activity: Arc<Mutex<Instant>>,
    stalls_rx: mpsc::Receiver<Stall>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Starts the poll task. The silence clock starts now.
    pub fn start(config: WatchdogConfig) -> Self {
        let last_activity = Arc::new(Mutex::new(Instant::now()));
        let (stalls_tx, stalls_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            config,
            last_activity.clone(),
            stalls_tx,
            cancel.clone(),
        ));

        Self {
            last_activity,
            stalls_rx,
            cancel,
            handle: Some(handle),
        }
    }

    /// Records inbound activity.
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    /// Waits for the next stall. Never resolves once stopped.
    pub async fn stalled(&mut self) -> Stall {
        match self.stalls_rx.recv().await {
            Some(stall) => stall,
            None => std::future::pending().await,
        }
    }

    /// Releases the timer. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.cancel();
            handle.abort();
            debug!("watchdog stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    config: WatchdogConfig,
    last_activity: Arc<Mutex<Instant>>,
    stalls_tx: mpsc::Sender<Stall>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(silent_for) = check(&last_activity, config.stall_threshold) else {
                    continue;
                };
                warn!(silent_ms = silent_for.as_millis() as u64, "no activity, connection looks stalled");
                if stalls_tx.send(Stall { silent_for }).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Returns the silence length if it exceeds `threshold`, restarting the
/// clock so one stall is reported once.
fn check(last_activity: &Mutex<Instant>, threshold: Duration) -> Option<Duration> {
    let mut last = last_activity.lock().ok()?;
    let now = Instant::now();
    let silent_for = now.saturating_duration_since(*last);
    if silent_for > threshold {
        *last = now;
        Some(silent_for)
    } else {
        None
    }
}
