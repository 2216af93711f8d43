use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::response_id;
use crate::core::kernel::keepalive::PongObserver;
use crate::core::kernel::ws::{Connection, WsReader};
use dashmap::DashMap;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

type Reply = Result<Vec<u8>, ExchangeError>;

/// Control calls waiting for their response, keyed by correlation id
#[derive(Debug, Default)]
pub struct PendingRequests {
    waiters: DashMap<String, oneshot::Sender<Reply>>,
}

impl PendingRequests {
    /// Register a waiter. Must happen before the request is enqueued so
    /// a fast response cannot arrive ahead of its waiter.
    pub fn register(&self, id: &str) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id.to_string(), tx);
        rx
    }

    /// Hand `frame` to the waiter for `id`, or give it back if nobody waits
    pub fn resolve(&self, id: &str, frame: Vec<u8>) -> Result<(), Vec<u8>> {
        match self.waiters.remove(id) {
            Some((_, tx)) => {
                if tx.send(Ok(frame)).is_err() {
                    trace!(%id, "waiter gone before its response arrived");
                }
                Ok(())
            }
            None => Err(frame),
        }
    }

    pub fn fail(&self, id: &str, err: ExchangeError) {
        if let Some((_, tx)) = self.waiters.remove(id) {
            let _ = tx.send(Err(err));
        }
    }

    /// Fail every outstanding waiter
    pub fn fail_all(&self, err: impl Fn() -> ExchangeError) {
        let ids: Vec<String> = self.waiters.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.fail(&id, err());
        }
    }

    pub fn remove(&self, id: &str) {
        self.waiters.remove(id);
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// Removes a waiter when the calling future is dropped or finishes
#[derive(Debug)]
pub struct PendingGuard {
    pending: Arc<PendingRequests>,
    id: String,
}

impl PendingGuard {
    pub fn new(pending: Arc<PendingRequests>, id: String) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

/// Sole consumer of the receive half.
///
/// Frames carrying the id of a waiting control call resolve that call;
/// everything else goes to the session's message channel in arrival
/// order. The first read failure is fatal for the connection.
pub struct InboundReader {
    stream: WsReader,
    connection: Arc<Connection>,
    pending: Arc<PendingRequests>,
    messages: mpsc::Sender<Vec<u8>>,
    errors: mpsc::Sender<ExchangeError>,
    pong: PongObserver,
    name: String,
}

impl InboundReader {
    pub fn new(
        stream: WsReader,
        connection: Arc<Connection>,
        pending: Arc<PendingRequests>,
        messages: mpsc::Sender<Vec<u8>>,
        errors: mpsc::Sender<ExchangeError>,
        pong: PongObserver,
        name: &str,
    ) -> Self {
        Self {
            stream,
            connection,
            pending,
            messages,
            errors,
            pong,
            name: name.to_string(),
        }
    }

    #[instrument(skip_all, fields(exchange = %self.name))]
    pub async fn run(mut self, token: CancellationToken) {
        let failure = loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => break None,
                next = self.stream.next() => next,
            };

            let frame = match next {
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Binary(data))) => data,
                Some(Ok(Message::Pong(_))) => {
                    trace!("pong received");
                    self.pong.observe();
                    continue;
                }
                // tungstenite queues the pong reply itself
                Some(Ok(Message::Ping(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "closed by peer".to_string(),
                        |f| format!("closed by peer: {} {}", u16::from(f.code), f.reason),
                    );
                    break Some(ExchangeError::ConnectionClosed(reason));
                }
                Some(Err(e)) => break Some(ExchangeError::Transport(format!("read failed: {}", e))),
                None => {
                    break Some(ExchangeError::ConnectionClosed(
                        "stream ended".to_string(),
                    ))
                }
            };

            self.connection.record_received(frame.len());
            if !self.route(frame, &token).await {
                break None;
            }
        };

        self.connection.mark_closed();
        match failure {
            Some(err) => {
                error!(error = %err, "inbound reader stopped");
                let reason = err.to_string();
                self.pending
                    .fail_all(|| ExchangeError::ConnectionClosed(reason.clone()));
                if token.is_cancelled() {
                    debug!("connection already torn down, read failure not reported");
                } else {
                    token.cancel();
                    if self.errors.try_send(err).is_err() {
                        warn!("error channel full or closed, read failure not delivered");
                    }
                }
            }
            None => {
                debug!("inbound reader cancelled");
                self.pending.fail_all(|| {
                    ExchangeError::ConnectionClosed("connection stopped".to_string())
                });
            }
        }
    }

    /// Returns false once the session is shutting down
    async fn route(&self, frame: Vec<u8>, token: &CancellationToken) -> bool {
        let frame = match response_id(&frame) {
            Some(id) => match self.pending.resolve(&id, frame) {
                Ok(()) => return true,
                Err(frame) => frame,
            },
            None => frame,
        };

        tokio::select! {
            biased;
            () = token.cancelled() => false,
            sent = self.messages.send(frame) => {
                if sent.is_err() {
                    trace!("message receiver dropped, discarding frame");
                }
                true
            }
        }
    }
}
