//! Native WebSocket transport using tokio-tungstenite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;
use webchannel_shared::TransportError;

use super::{DialedTransport, TransportFactory, TransportHandle};

/// Dials `ws://` / `wss://` endpoints.
#[derive(Debug, Clone, Default)]
pub struct WsTransportFactory;

impl WsTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportFactory for WsTransportFactory {
    async fn dial(&self, endpoint: &str) -> Result<DialedTransport, TransportError> {
        let url =
            Url::parse(endpoint).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(map_dial_error)?;
        tracing::info!(endpoint, "websocket transport open");

        let (mut write, mut read) = stream.split();
        let open = Arc::new(AtomicBool::new(true));
        let (cmd_tx, mut cmd_rx) = unbounded::<Command>();
        let (frame_tx, frame_rx) = unbounded::<String>();

        // Write pump: frames and the final close request.
        let open_for_write = Arc::clone(&open);
        let endpoint_for_write = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.next().await {
                match cmd {
                    Command::Frame(text) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            tracing::error!(
                                endpoint = %endpoint_for_write,
                                "websocket send failed: {e}"
                            );
                            open_for_write.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                    Command::Close(done) => {
                        let result = write
                            .send(Message::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: "".into(),
                            })))
                            .await
                            .map_err(|e| TransportError::Close(e.to_string()));
                        open_for_write.store(false, Ordering::SeqCst);
                        let _ = done.send(result);
                        break;
                    }
                }
            }
        });

        // Read pump: text frames out, everything else handled in place.
        let open_for_read = Arc::clone(&open);
        let endpoint_for_read = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if frame_tx.unbounded_send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!(
                            endpoint = %endpoint_for_read,
                            "websocket received close frame"
                        );
                        break;
                    }
                    // Pong replies are handled by tungstenite; binary frames
                    // are not part of this protocol.
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(
                            endpoint = %endpoint_for_read,
                            "websocket read error: {e}"
                        );
                        break;
                    }
                }
            }
            open_for_read.store(false, Ordering::SeqCst);
        });

        Ok(DialedTransport {
            handle: Arc::new(WsTransport { open, cmd_tx }),
            incoming: Box::pin(frame_rx),
        })
    }
}

enum Command {
    Frame(String),
    Close(oneshot::Sender<Result<(), TransportError>>),
}

struct WsTransport {
    open: Arc<AtomicBool>,
    cmd_tx: UnboundedSender<Command>,
}

#[async_trait]
impl TransportHandle for WsTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.cmd_tx.is_closed()
    }

    fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Send("transport is closed".to_string()));
        }
        self.cmd_tx
            .unbounded_send(Command::Frame(frame))
            .map_err(|_| TransportError::Send("transport is closed".to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .cmd_tx
            .unbounded_send(Command::Close(done_tx))
            .is_err()
        {
            // Write pump already gone; nothing left to close.
            return Ok(());
        }
        match done_rx.await {
            Ok(result) => result,
            // Pump dropped mid-close; the socket is down either way.
            Err(_) => Ok(()),
        }
    }
}

fn map_dial_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::ClosedBeforeOpen
        }
        other => TransportError::Connect(other.to_string()),
    }
}
