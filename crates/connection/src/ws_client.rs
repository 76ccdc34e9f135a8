//! One physical WebSocket link to the deploy endpoint.
//!
//! A [`WsClient`] owns the read, write and ping pumps of a single
//! connection. It knows nothing about retries; [`TransportSocket`]
//! (crate::TransportSocket) replaces it wholesale when it dies.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use url::Url;

use flux_protocol::constants::DEPLOY_WS_PATH;

use crate::types::{LinkConfig, LinkEvent};

/// How long a graceful close waits for the close frame to be flushed.
const WS_CLOSE_WAIT: Duration = Duration::from_secs(2);

/// Errors from a single link.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection closed")]
    Closed,
}

/// A live link: outbound frames go in, [`LinkEvent`]s come out.
pub struct WsClient {
    write_tx: mpsc::Sender<tungstenite::Message>,
    events_rx: mpsc::Receiver<LinkEvent>,
    cancel: CancellationToken,
    write_handle: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl WsClient {
    /// Opens a WebSocket to `url` and starts its pumps.
    pub async fn connect(url: &str, config: &LinkConfig) -> Result<Self, WsError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_size);
        ws_config.max_frame_size = Some(config.max_message_size);
        let dial = tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false);
        let (ws_stream, _) = tokio::time::timeout(config.connect_timeout, dial)
            .await
            .map_err(|_| WsError::ConnectTimeout(config.connect_timeout))??;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(64);
        let (events_tx, events_rx) = mpsc::channel::<LinkEvent>(256);
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            cancel.clone(),
        ));

        let mut tasks = vec![tokio::spawn(crate::pumps::read::read_pump(
            read,
            events_tx,
            write_tx.clone(),
            cancel.clone(),
        ))];

        if let Some(period) = config.ping_period {
            tasks.push(tokio::spawn(crate::pumps::ping::ping_pump(
                write_tx.clone(),
                period,
                cancel.clone(),
            )));
        }

        Ok(Self {
            write_tx,
            events_rx,
            cancel,
            write_handle: Some(write_handle),
            tasks,
        })
    }

    /// Wraps an already established frame pipe, e.g. an in-process link.
    ///
    /// Frames written by the client appear on the receiving end of
    /// `write_tx`; events pushed into the sending end of `events_rx` are
    /// delivered as if they came off the wire.
    pub fn from_channels(
        write_tx: mpsc::Sender<tungstenite::Message>,
        events_rx: mpsc::Receiver<LinkEvent>,
    ) -> Self {
        Self {
            write_tx,
            events_rx,
            cancel: CancellationToken::new(),
            write_handle: None,
            tasks: Vec::new(),
        }
    }

    /// Queues a text frame.
    pub async fn send_text(&self, text: String) -> Result<(), WsError> {
        self.write_tx
            .send(tungstenite::Message::Text(text.into()))
            .await
            .map_err(|_| WsError::Closed)
    }

    /// Waits for the next event. A link whose pumps are gone reports an
    /// abnormal closure.
    pub async fn next_event(&mut self) -> LinkEvent {
        self.events_rx.recv().await.unwrap_or(LinkEvent::Closed(None))
    }

    /// Sends a normal-closure frame and waits briefly for it to be flushed.
    pub async fn close(mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if self
            .write_tx
            .send(tungstenite::Message::Close(Some(frame)))
            .await
            .is_ok()
            && let Some(handle) = self.write_handle.as_mut()
        {
            let _ = tokio::time::timeout(WS_CLOSE_WAIT, handle).await;
        }
        // Drop tears down whatever is still running.
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = &self.write_handle {
            handle.abort();
        }
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Future returned by [`Connector::connect`].
pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = Result<WsClient, WsError>> + Send + 'a>>;

/// Source of fresh links.
///
/// [`WsConnector`] dials the real endpoint; tests plug in scripted links.
pub trait Connector: Send + Sync {
    /// Opens one new link.
    fn connect(&self) -> ConnectFuture<'_>;

    /// Where links go, for logs.
    fn endpoint(&self) -> &str;
}

/// Dials the deploy WebSocket of a Flux endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    config: LinkConfig,
}

impl WsConnector {
    /// Connector for an explicit WebSocket URL.
    pub fn new(url: impl Into<String>, config: LinkConfig) -> Self {
        Self {
            url: url.into(),
            config,
        }
    }

    /// Connector for the deploy socket of an `http(s)://` or `ws(s)://` endpoint.
    pub fn for_endpoint(endpoint: &str, config: LinkConfig) -> Result<Self, WsError> {
        Ok(Self::new(deploy_url(endpoint)?, config))
    }
}

impl Connector for WsConnector {
    fn connect(&self) -> ConnectFuture<'_> {
        Box::pin(WsClient::connect(&self.url, &self.config))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Joins [`DEPLOY_WS_PATH`] onto `endpoint` and switches to a WebSocket scheme.
pub fn deploy_url(endpoint: &str) -> Result<String, WsError> {
    let invalid = |reason: String| WsError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint)
        .and_then(|base| base.join(DEPLOY_WS_PATH))
        .map_err(|e| invalid(e.to_string()))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot switch to {scheme}")))?;

    Ok(url.into())
}
