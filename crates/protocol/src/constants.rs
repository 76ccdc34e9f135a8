use std::time::Duration;

/// Path of the deploy WebSocket, relative to the Flux endpoint.
pub const DEPLOY_WS_PATH: &str = "/back/ws/deploy/";

/// Close code for a graceful end of stream. Any other code is abnormal.
pub const WS_CLOSE_NORMAL: u16 = 1000;

/// Maximum inbound message size in bytes (50 MB).
///
/// Log chunks travel base64-encoded inside update frames, so a single frame
/// can get large when a build step is chatty.
pub const WS_MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// How long one dial (TCP plus WebSocket handshake) may take before it
/// counts as a failed attempt.
pub const WS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the link sends keep-alive pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Abnormal closures tolerated before the transport gives up.
pub const DEFAULT_RETRIES: u32 = 10;

/// Fixed wait between a disconnect and the next connect attempt.
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Silence on an open link after which the watchdog forces a reconnect.
pub const DEFAULT_STALL_THRESHOLD: Duration = Duration::from_secs(10);

/// How often the watchdog checks for silence.
pub const DEFAULT_WATCHDOG_POLL: Duration = Duration::from_secs(1);

/// Overall deadline for one deployment (30 minutes).
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(1800);
