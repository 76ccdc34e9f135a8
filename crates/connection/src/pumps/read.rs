//! WebSocket read pump: turns raw frames into [`LinkEvent`]s.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::types::LinkEvent;

/// Reads frames from the WebSocket and forwards text and closure events.
///
/// Exactly one `Closed` event is emitted when the link ends on its own.
/// A local cancel ends the pump silently.
pub(crate) async fn read_pump<S>(
    mut read: S,
    events_tx: mpsc::Sender<LinkEvent>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let closed = loop {
        tokio::select! {
            _ = cancel.cancelled() => return,

            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let event = LinkEvent::Text(text.as_str().to_owned());
                        if events_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    Some(Ok(tungstenite::Message::Pong(_))) => {
                        trace!("received pong");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        debug!(?code, "received close frame");
                        break LinkEvent::Closed(code);
                    }
                    Some(Ok(_)) => {
                        debug!("ignoring non-text frame");
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break LinkEvent::Closed(None);
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break LinkEvent::Closed(None);
                    }
                }
            }
        }
    };

    let _ = events_tx.send(closed).await;
}
