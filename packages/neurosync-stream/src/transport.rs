// Pluggable transport
//
// The client only sees a `Connector` that opens channels and a `Channel` that
// yields events in arrival order. `WsConnector` is the production
// implementation; tests script their own.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::types::{StreamError, StreamResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event delivered by an open channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One text frame
    Message(String),
    /// Transport failure; the channel is unusable afterwards
    Error(String),
    /// Graceful close from the remote side
    Closed,
}

/// Opens channels to an endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &str) -> StreamResult<Box<dyn Channel>>;
}

/// An established bidirectional channel
///
/// Exclusively owned by one client session.
#[async_trait]
pub trait Channel: Send {
    /// Next inbound event; `None` once the underlying stream has ended
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    async fn send_text(&mut self, text: String) -> StreamResult<()>;

    async fn close(&mut self);
}

/// WebSocket connector over tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, endpoint: &str) -> StreamResult<Box<dyn Channel>> {
        let (stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| StreamError::WebSocket(format!("Connection failed: {}", e)))?;

        Ok(Box::new(WsChannel { stream }))
    }
}

struct WsChannel {
    stream: WsStream,
}

#[async_trait]
impl Channel for WsChannel {
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(ChannelEvent::Message(text.to_string())),
                Ok(Message::Binary(data)) => {
                    // decoded like text; non-JSON bytes are discarded by the decoder
                    return Some(ChannelEvent::Message(
                        String::from_utf8_lossy(&data).into_owned(),
                    ));
                }
                Ok(Message::Close(_)) => return Some(ChannelEvent::Closed),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                    // pongs are queued by tungstenite itself
                    continue;
                }
                Err(e) => return Some(ChannelEvent::Error(e.to_string())),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> StreamResult<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| StreamError::WebSocket(format!("Send failed: {}", e)))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("WebSocket close handshake failed: {}", e);
        }
    }
}
