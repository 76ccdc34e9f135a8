//! Sinks for deployment progress.

use tokio::sync::mpsc;
use tracing::warn;

use flux_protocol::Update;

use crate::error::DeployError;

/// Receives every accepted update, in order, exactly once.
pub trait Reporter: Send {
    fn report(&mut self, update: &Update);

    /// Called with errors as they happen: non-fatal ones (a frame that
    /// failed to decode) and the one that ends the session. Returning an
    /// error for a non-fatal one aborts the session with it.
    fn report_error(&mut self, error: &DeployError) -> Result<(), DeployError> {
        let _ = error;
        Ok(())
    }
}

/// Event forwarded by [`ChannelReporter`].
#[derive(Debug, Clone)]
pub enum DeployEvent {
    Update(Update),
    Error { kind: &'static str, message: String },
}

/// Forwards progress over a channel, e.g. to a UI task.
///
/// The channel is unbounded: the session never waits on the consumer and no
/// event is lost while the receiver is alive.
pub struct ChannelReporter {
    events_tx: mpsc::UnboundedSender<DeployEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeployEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (Self { events_tx }, events_rx)
    }

    fn emit(&self, event: DeployEvent) {
        if self.events_tx.send(event).is_err() {
            warn!("deploy event receiver dropped");
        }
    }
}

impl Reporter for ChannelReporter {
    fn report(&mut self, update: &Update) {
        self.emit(DeployEvent::Update(update.clone()));
    }

    fn report_error(&mut self, error: &DeployError) -> Result<(), DeployError> {
        self.emit(DeployEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
        Ok(())
    }
}
