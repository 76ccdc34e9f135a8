//! Self-healing transport over a sequence of physical links.
//!
//! [`TransportSocket`] is an explicit state machine with a single
//! "await next event" entry point, [`receive_next`](TransportSocket::receive_next).
//! Connect attempts, backoff sleeps and link reads all happen inside that
//! call, so dropping it (e.g. from a `select!`) cancels whatever was in
//! flight without losing bookkeeping.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use flux_protocol::constants::WS_CLOSE_NORMAL;
use flux_protocol::{ClientMessage, DecodeError, ServerMessage};

use crate::reconnection::RetryBudget;
use crate::types::{Inbound, LinkEvent, RetryPolicy, SocketState};
use crate::ws_client::{Connector, WsClient};

/// Errors surfaced by [`TransportSocket`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket is not open")]
    NotOpen,

    #[error("cannot {operation} a socket in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SocketState,
    },

    #[error("connection lost after {attempts} attempts (last close code: {})", fmt_code(.last_close))]
    Connection {
        attempts: u32,
        last_close: Option<u16>,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

fn fmt_code(code: &Option<u16>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Duplex connection that reconnects by itself after abnormal closures.
pub struct TransportSocket {
    connector: Box<dyn Connector>,
    budget: RetryBudget,
    state: SocketState,
    link: Option<WsClient>,
    /// When the next connect attempt is due. `None` while open, done, or
    /// after the budget ran out.
    retry_at: Option<Instant>,
    /// Set on a successful connect, cleared once `Opened` is handed out.
    opened: bool,
    attempts: u32,
    last_close: Option<u16>,
}

impl TransportSocket {
    pub fn new(connector: Box<dyn Connector>, policy: RetryPolicy) -> Self {
        Self {
            connector,
            budget: RetryBudget::new(policy),
            state: SocketState::Pending,
            link: None,
            retry_at: None,
            opened: false,
            attempts: 0,
            last_close: None,
        }
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    /// Connect attempts made so far, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Arms a connect attempt.
    ///
    /// Only valid from `Pending` or `Error`. The attempt itself runs inside
    /// [`receive_next`](Self::receive_next); if it fails, it goes through
    /// the retry policy like any abnormal closure instead of erroring here.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        match self.state {
            SocketState::Pending | SocketState::Error if !self.budget.is_exhausted() => {
                self.retry_at = Some(Instant::now());
                Ok(())
            }
            state => Err(TransportError::InvalidState {
                operation: "connect",
                state,
            }),
        }
    }

    /// Sends one frame on the current link.
    pub async fn send(&self, msg: &ClientMessage) -> Result<(), TransportError> {
        let link = match (&self.state, &self.link) {
            (SocketState::Open, Some(link)) => link,
            _ => return Err(TransportError::NotOpen),
        };
        let text = msg.encode()?;
        link.send_text(text)
            .await
            .map_err(|_| TransportError::NotOpen)
    }

    /// Waits for the next thing worth telling the caller about.
    ///
    /// Transient abnormal closures are absorbed here: the link is replaced
    /// after the policy's backoff and the caller sees a fresh
    /// [`Inbound::Opened`]. A frame that fails to decode is returned as
    /// [`TransportError::Decode`] with the link left open.
    pub async fn receive_next(&mut self) -> Result<Inbound, TransportError> {
        loop {
            match self.state {
                SocketState::Done => return Ok(Inbound::EndOfStream),

                SocketState::Open => {
                    if std::mem::take(&mut self.opened) {
                        return Ok(Inbound::Opened {
                            attempt: self.attempts,
                        });
                    }

                    let Some(link) = self.link.as_mut() else {
                        self.on_abnormal_close(None);
                        continue;
                    };

                    match link.next_event().await {
                        LinkEvent::Text(text) => {
                            self.budget.record_progress();
                            return Ok(Inbound::Message(ServerMessage::decode(&text)?));
                        }
                        LinkEvent::Closed(Some(WS_CLOSE_NORMAL)) => {
                            info!("server closed the stream");
                            self.link = None;
                            self.state = SocketState::Done;
                            return Ok(Inbound::EndOfStream);
                        }
                        LinkEvent::Closed(code) => {
                            self.link = None;
                            self.on_abnormal_close(code);
                        }
                    }
                }

                SocketState::Pending | SocketState::Error => {
                    let Some(at) = self.retry_at else {
                        return Err(self.idle_error());
                    };
                    tokio::time::sleep_until(at).await;
                    self.attempt_connect().await;
                }
            }
        }
    }

    /// Drops the current link as if it had died and goes through the retry
    /// path. No-op unless open.
    pub fn force_reconnect(&mut self) {
        if self.state != SocketState::Open {
            return;
        }
        warn!("forcing reconnect");
        // Dropping without a close frame: the server sees an abnormal close.
        self.link = None;
        self.opened = false;
        self.on_abnormal_close(None);
    }

    /// Closes the socket for good. Safe to call repeatedly and from any state.
    pub async fn close(&mut self) {
        self.retry_at = None;
        self.opened = false;
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        if self.state != SocketState::Done {
            debug!(state = %self.state, "transport closed");
            self.state = SocketState::Done;
        }
    }

    async fn attempt_connect(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        let attempt = self.attempts;
        debug!(attempt, endpoint = %self.connector.endpoint(), "connecting");

        let result = self.connector.connect().await;
        self.retry_at = None;

        match result {
            Ok(link) => {
                info!(attempt, "connected");
                self.link = Some(link);
                self.state = SocketState::Open;
                self.opened = true;
            }
            Err(e) => {
                warn!(attempt, error = %e, "connect attempt failed");
                self.on_abnormal_close(None);
            }
        }
    }

    fn on_abnormal_close(&mut self, code: Option<u16>) {
        self.state = SocketState::Error;
        self.last_close = code;

        match self.budget.record_closure() {
            Some(delay) => {
                warn!(
                    ?code,
                    closures = self.budget.closures(),
                    retry_in_ms = delay.as_millis() as u64,
                    "link closed abnormally, will reconnect"
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            None => {
                warn!(
                    ?code,
                    attempts = self.attempts,
                    "link closed abnormally, retry budget exhausted"
                );
                self.retry_at = None;
            }
        }
    }

    fn idle_error(&self) -> TransportError {
        if self.budget.is_exhausted() {
            TransportError::Connection {
                attempts: self.attempts,
                last_close: self.last_close,
            }
        } else {
            TransportError::InvalidState {
                operation: "receive from",
                state: self.state,
            }
        }
    }
}
