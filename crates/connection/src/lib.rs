//! Resilient WebSocket transport for the Flux deploy client.
//!
//! Provides the per-link WebSocket client, a [`TransportSocket`] that
//! transparently replaces dead links under a bounded retry policy, and a
//! [`Watchdog`] that flags links gone silent.

mod pumps;
pub(crate) mod reconnection;
pub mod transport;
pub mod types;
pub mod watchdog;
pub mod ws_client;

pub use transport::{TransportError, TransportSocket};
pub use types::{Inbound, LinkConfig, LinkEvent, RetryPolicy, SocketState, WatchdogConfig};
pub use watchdog::{Stall, Watchdog};
pub use ws_client::{ConnectFuture, Connector, WsClient, WsConnector, WsError, deploy_url};
