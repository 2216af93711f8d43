use crate::core::errors::ExchangeError;
use crate::core::traits::Pinger;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, instrument};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
/// Receive half handed to the inbound reader
pub type WsReader = SplitStream<WsStream>;
type WsWriter = SplitSink<WsStream, Message>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Traffic counters, updated by the writer and reader tasks
#[derive(Debug, Default)]
pub struct ConnectionStats {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    pings_sent: AtomicU64,
}

impl ConnectionStats {
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent.load(Ordering::Relaxed)
    }
}

/// The single WebSocket transport of a session.
///
/// Owns the send half; the receive half is handed out once by [`Connection::open`]
/// and belongs to the inbound reader from then on.
pub struct Connection {
    url: String,
    name: String,
    write: Mutex<Option<WsWriter>>,
    open: AtomicBool,
    stats: ConnectionStats,
}

impl Connection {
    /// Dial `url` once. No pooling and no retries.
    #[instrument(skip(connect_timeout), fields(exchange = %name))]
    pub async fn open(
        url: &str,
        name: &str,
        connect_timeout: Duration,
    ) -> Result<(Arc<Self>, WsReader), ExchangeError> {
        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                ExchangeError::ConnectionTimeout(format!(
                    "WebSocket connection to {} timed out after {:?}",
                    url, connect_timeout
                ))
            })?
            .map_err(|e| ExchangeError::Transport(format!("WebSocket connection failed: {}", e)))?;

        let (write, read) = ws_stream.split();
        info!("websocket connected");

        let connection = Self {
            url: url.to_string(),
            name: name.to_string(),
            write: Mutex::new(Some(write)),
            open: AtomicBool::new(true),
            stats: ConnectionStats::default(),
        };
        Ok((Arc::new(connection), read))
    }

    /// Write one complete frame. Callers are serialized on the send half.
    pub async fn send(&self, msg: Message) -> Result<(), ExchangeError> {
        let bytes = match &msg {
            Message::Text(text) => text.len(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data.len(),
            _ => 0,
        } as u64;

        let mut guard = self.write.lock().await;
        let write = guard.as_mut().ok_or_else(|| {
            ExchangeError::ConnectionClosed("WebSocket write stream not available".to_string())
        })?;

        write.send(msg).await.map_err(|e| {
            self.open.store(false, Ordering::Release);
            ExchangeError::Transport(format!("Failed to send WebSocket message: {}", e))
        })?;

        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        Ok(())
    }

    pub async fn send_text(&self, text: String) -> Result<(), ExchangeError> {
        self.send(Message::Text(text)).await
    }

    /// Close the transport. Calling it again is a no-op.
    #[instrument(skip(self), fields(exchange = %self.name, url = %self.url))]
    pub async fn close(&self) -> Result<(), ExchangeError> {
        self.open.store(false, Ordering::Release);
        let write = match tokio::time::timeout(CLOSE_TIMEOUT, self.write.lock()).await {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                debug!("send half still busy, skipping close handshake");
                None
            }
        };

        if let Some(mut write) = write {
            let closing = async {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!("close frame not delivered: {}", e);
                }
                let _ = write.close().await;
            };
            if tokio::time::timeout(CLOSE_TIMEOUT, closing).await.is_err() {
                debug!("peer did not acknowledge close in time");
            }
            info!("websocket closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Called by the reader once the receive side has failed or ended
    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Pinger for Connection {
    async fn ping(&self, payload: Vec<u8>) -> Result<(), ExchangeError> {
        self.send(Message::Ping(payload)).await?;
        self.stats.pings_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
