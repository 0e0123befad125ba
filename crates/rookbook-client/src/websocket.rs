//! WebSocket transport.
//!
//! One connection, two tasks: a writer draining an outbound channel of
//! encoded frames, and a reader decoding inbound text frames and handing
//! them to the client actor. The reader reports loss of the socket via
//! [`ClientHandle::connection_lost`]; there is no reconnection here.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, trace, warn};

use crate::actor::ClientHandle;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{Transport, TransportError};

/// Outbound half of a WebSocket connection.
///
/// Once the socket ends, every clone reports closed and `send` fails,
/// even if the writer task has not noticed yet.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl Transport for WebSocketTransport {
    fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let text = message.encode()?;
        trace!(kind = message.kind(), "queueing frame");
        self.tx.send(text).map_err(|_| TransportError::Closed)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }
}

impl WebSocketTransport {
    /// Open `url` and start the reader and writer tasks.
    ///
    /// Inbound messages go to `handle`. The returned transport still has to
    /// be attached to the client for outbound traffic; attaching it after
    /// the socket has ended is refused by the client.
    pub async fn connect(url: &str, handle: ClientHandle) -> Result<Self, tokio_tungstenite::tungstenite::Error> {
        let (ws_stream, _response) = connect_async(url).await?;
        info!(%url, "websocket connected");
        let (mut write, mut read) = ws_stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());

        // Writer: ends when every transport clone is dropped, the socket
        // fails, or the reader sees the socket end.
        let writer_closed = Arc::clone(&closed);
        let writer_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = rx.recv() => match next {
                        Some(text) => {
                            if let Err(e) = write.send(WsMessage::Text(text)).await {
                                warn!("websocket write failed: {e}");
                                writer_closed.store(true, Ordering::Release);
                                return;
                            }
                        }
                        None => break,
                    },
                    _ = writer_shutdown.notified() => {
                        debug!("socket ended, stopping writer");
                        return;
                    }
                }
            }
            let _ = write.send(WsMessage::Close(None)).await;
            debug!("websocket writer finished");
        });

        // Reader
        let reader_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(WsMessage::Text(text))) => match ServerMessage::decode(&text) {
                        Ok(message) => {
                            trace!(kind = message.kind(), "frame received");
                            if handle.deliver(message).is_err() {
                                debug!("client actor gone, stopping reader");
                                break None;
                            }
                        }
                        Err(e) => warn!("dropping undecodable frame: {e}"),
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        break Some(frame.map_or_else(|| "closed by server".to_string(), |f| f.reason.to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break Some("stream ended".to_string()),
                }
            };
            // Mark closed before the actor hears about it, so a late attach sees it.
            reader_closed.store(true, Ordering::Release);
            shutdown.notify_one();
            if let Some(reason) = reason {
                info!(%reason, "websocket disconnected");
                let _ = handle.connection_lost(reason);
            }
        });

        Ok(Self { tx, closed })
    }
}
