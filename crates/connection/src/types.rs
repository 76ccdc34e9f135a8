//! Public types for the deploy transport.

use std::fmt;
use std::time::Duration;

use flux_protocol::ServerMessage;
use flux_protocol::constants::{
    DEFAULT_RETRIES, DEFAULT_RETRY_WAIT, DEFAULT_STALL_THRESHOLD, DEFAULT_WATCHDOG_POLL,
    WS_CONNECT_TIMEOUT, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD,
};

/// State of a [`TransportSocket`](crate::TransportSocket).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Created, no connect attempt yet.
    Pending,
    /// A link is up and accepts sends.
    Open,
    /// Closed for good: normal closure from the server or a local close.
    Done,
    /// Last link closed abnormally; a retry may be scheduled.
    Error,
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Open => "open",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Raw event coming off one physical link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A text frame.
    Text(String),
    /// The link went away. `None` means no close code (read error, dropped
    /// TCP connection, close frame without status).
    Closed(Option<u16>),
}

/// What [`TransportSocket::receive_next`](crate::TransportSocket::receive_next) yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A physical connection was (re-)established. `attempt` is 1-based and
    /// counts every connect attempt made by this socket.
    Opened { attempt: u32 },
    /// A decoded server frame.
    Message(ServerMessage),
    /// The server closed the stream normally.
    EndOfStream,
}

/// Bounded reconnect policy.
///
/// With the default `backoff_factor` of 1.0 every retry waits exactly
/// `wait_before_retry`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Abnormal closures tolerated before giving up.
    pub retries: u32,
    /// Wait before the first retry.
    pub wait_before_retry: Duration,
    /// Multiplier applied for each further consecutive closure.
    pub backoff_factor: f64,
    /// Cap on the wait between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            wait_before_retry: DEFAULT_RETRY_WAIT,
            backoff_factor: 1.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before reconnecting after the `closures`-th consecutive abnormal
    /// closure (1-based), or `None` once the budget is spent.
    pub fn delay_after(&self, closures: u32) -> Option<Duration> {
        if closures >= self.retries {
            return None;
        }
        let exp = closures.saturating_sub(1).min(63) as i32;
        let secs = self.wait_before_retry.as_secs_f64() * self.backoff_factor.powi(exp);
        Some(Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64())))
    }
}

/// Stall detection settings.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Silence longer than this forces a reconnect.
    pub stall_threshold: Duration,
    /// How often silence is checked.
    pub poll_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            poll_interval: DEFAULT_WATCHDOG_POLL,
        }
    }
}

/// Settings for one physical WebSocket link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub max_message_size: usize,
    pub connect_timeout: Duration,
    /// `None` disables keep-alive pings.
    pub ping_period: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_message_size: WS_MAX_MESSAGE_SIZE,
            connect_timeout: WS_CONNECT_TIMEOUT,
            ping_period: Some(WS_PING_PERIOD),
        }
    }
}
