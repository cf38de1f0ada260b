//! Transport seam: the raw bidirectional socket under the signaling channel.
//!
//! The client only ever talks to the [`Transport`] trait; the WebSocket
//! implementation below is the production one, and tests substitute a
//! scripted mock.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// How the connection was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// The socket errored or the stream ended without a close frame.
    TransportError,
    /// The server closed the connection deliberately.
    ServerInitiated,
}

/// An event produced by the transport layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport has successfully connected.
    Connected,
    /// A text frame has been received from the server.
    FrameReceived(String),
    /// The connection was lost.
    Disconnected(DisconnectKind),
}

/// Represents an active network connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a text frame to the server.
    async fn send_text(&self, frame: &str) -> Result<(), anyhow::Error>;

    /// Closes the connection.
    async fn disconnect(&self);
}

/// A factory responsible for creating new transport instances.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Creates a connected transport and a stream of its events.
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error>;
}

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tokio/tungstenite-backed WebSocket transport.
pub struct WebSocketTransport {
    sink: Mutex<Option<WsSink>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&self, frame: &str) -> Result<(), anyhow::Error> {
        let mut guard = self.sink.lock().await;
        let sink = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("socket is closed"))?;
        debug!(target: "Transport", "--> {} bytes", frame.len());
        sink.send(Message::text(frame))
            .await
            .map_err(|e| anyhow::anyhow!("websocket send error: {e}"))?;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut guard = self.sink.lock().await;
        if let Some(mut sink) = guard.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
}

/// Factory connecting to a fixed signaling server URL.
pub struct WebSocketTransportFactory {
    url: String,
}

impl WebSocketTransportFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl TransportFactory for WebSocketTransportFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        let (ws, _response) = connect_async(&self.url).await?;
        let (sink, mut stream) = ws.split();

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let _ = tx.send(TransportEvent::Connected).await;

        tokio::spawn(async move {
            let mut closed = false;
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if tx
                            .send(TransportEvent::FrameReceived(text.to_string()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(target: "Transport", "server close frame: {frame:?}");
                        let _ = tx
                            .send(TransportEvent::Disconnected(DisconnectKind::ServerInitiated))
                            .await;
                        closed = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(target: "Transport", "websocket read error: {e}");
                        let _ = tx
                            .send(TransportEvent::Disconnected(DisconnectKind::TransportError))
                            .await;
                        closed = true;
                        break;
                    }
                }
            }
            if !closed {
                let _ = tx
                    .send(TransportEvent::Disconnected(DisconnectKind::TransportError))
                    .await;
            }
        });

        Ok((Arc::new(WebSocketTransport { sink: Mutex::new(Some(sink)) }), rx))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// A transport that records sent frames, for testing purposes.
    #[derive(Default)]
    pub struct MockTransport {
        pub sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send_text(&self, frame: &str) -> Result<(), anyhow::Error> {
            self.sent.lock().await.push(frame.to_string());
            Ok(())
        }

        async fn disconnect(&self) {}
    }

    /// A factory handing out [`MockTransport`]s plus a sender the test can
    /// use to inject server events.
    pub struct MockTransportFactory {
        pub injector: Mutex<Option<mpsc::Sender<TransportEvent>>>,
        pub transport: Arc<MockTransport>,
    }

    impl MockTransportFactory {
        pub fn new() -> Self {
            Self {
                injector: Mutex::new(None),
                transport: Arc::new(MockTransport::default()),
            }
        }
    }

    #[async_trait]
    impl TransportFactory for MockTransportFactory {
        async fn create_transport(
            &self,
        ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
            let (tx, rx) = mpsc::channel(16);
            let _ = tx.send(TransportEvent::Connected).await;
            *self.injector.lock().await = Some(tx);
            Ok((self.transport.clone(), rx))
        }
    }
}
