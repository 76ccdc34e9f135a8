//! Overall deadline for a deployment run.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Single-shot timer bounding the whole run.
///
/// [`expired`](Self::expired) resolves once, when the deadline passes.
/// After [`cancel`](Self::cancel) or after firing it stays pending forever,
/// so it can sit in a `select!` loop unconditionally.
pub struct DeadlineGuard {
    sleep: Pin<Box<Sleep>>,
    duration: Duration,
    armed: bool,
}

impl DeadlineGuard {
    /// Starts the clock now.
    pub fn start(duration: Duration) -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(duration)),
            duration,
            armed: true,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn deadline(&self) -> Instant {
        self.sleep.deadline()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn cancel(&mut self) {
        self.armed = false;
    }

    /// Resolves with the configured duration when the deadline passes.
    pub async fn expired(&mut self) -> Duration {
        if !self.armed {
            return std::future::pending().await;
        }
        self.sleep.as_mut().await;
        self.armed = false;
        self.duration
    }
}
