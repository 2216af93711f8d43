use crate::core::config::SessionConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    canonicalize, encode_request, signer_for, Connection, ConnectionStats, InboundReader,
    KeepaliveHandle, KeepaliveMonitor, KeepaliveSettings, KeepaliveState, Outbound,
    OutboundWriter, PendingGuard, PendingRequests, Signer,
};
use crate::core::traits::FrameSink;
use crate::core::types::{ParamValue, Request, WireRequest};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Inbound frames not claimed by a control call, in arrival order
pub type MessageSource = mpsc::Receiver<Vec<u8>>;
/// Fatal transport conditions, each delivered once
pub type ErrorSource = mpsc::Receiver<ExchangeError>;

/// Everything that lives exactly as long as one connection
struct Link {
    connection: Arc<Connection>,
    keepalive: KeepaliveHandle,
    errors: mpsc::Sender<ExchangeError>,
    token: CancellationToken,
}

/// The writer's view of the connection. Empty until `serve` succeeds.
#[derive(Default)]
struct Wire {
    link: OnceLock<Link>,
}

#[async_trait]
impl FrameSink for Wire {
    fn is_live(&self) -> bool {
        self.link
            .get()
            .is_some_and(|link| link.connection.is_open() && !link.token.is_cancelled())
    }

    async fn write_text(&self, frame: String) -> Result<(), ExchangeError> {
        let link = self.link.get().ok_or(ExchangeError::NotConnected)?;

        let written = tokio::select! {
            written = link.connection.send_text(frame) => written,
            () = link.token.cancelled() => Err(ExchangeError::ConnectionClosed(
                "connection stopped during write".to_string(),
            )),
        };

        if let Err(e) = &written {
            if !link.token.is_cancelled() {
                // a failed write kills the connection like a failed read
                link.token.cancel();
                if link
                    .errors
                    .try_send(ExchangeError::Transport(e.to_string()))
                    .is_err()
                {
                    warn!("error channel full or closed, write failure not delivered");
                }
            }
        }
        written
    }
}

/// An authenticated duplex session over a single WebSocket connection.
///
/// `serve` dials and starts the reader and keepalive tasks. `send` signs
/// and enqueues a request; `call` does the same and waits for the frame
/// carrying the request's id. The connection stays open across calls
/// until `close`, cancellation, or a fatal transport error.
pub struct Session {
    config: Arc<SessionConfig>,
    wire: Arc<Wire>,
    pending: Arc<PendingRequests>,
    serving: AtomicBool,
    signer: OnceCell<Arc<dyn Signer>>,
    writer: OnceCell<OutboundWriter>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_config(Arc::new(config))
    }

    pub fn with_config(config: Arc<SessionConfig>) -> Self {
        Self {
            config,
            wire: Arc::new(Wire::default()),
            pending: Arc::new(PendingRequests::default()),
            serving: AtomicBool::new(false),
            signer: OnceCell::new(),
            writer: OnceCell::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Open the connection and start the reader and keepalive tasks.
    ///
    /// Cancelling `cancel` tears the connection down. A session serves at
    /// most one connection; a failed dial may be retried on the same session.
    #[instrument(skip_all, fields(exchange = %self.config.name, endpoint = %self.config.endpoint))]
    pub async fn serve(
        &self,
        cancel: CancellationToken,
    ) -> Result<(MessageSource, ErrorSource), ExchangeError> {
        if self.shutdown.is_cancelled() {
            return Err(ExchangeError::SessionClosed);
        }
        if self.serving.swap(true, Ordering::AcqRel) {
            return Err(ExchangeError::AlreadyServing);
        }

        let transport = &self.config.transport;
        let (connection, stream) = match Connection::open(
            &self.config.endpoint,
            &self.config.name,
            transport.connect_timeout,
        )
        .await
        {
            Ok(opened) => opened,
            Err(e) => {
                self.serving.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let (messages_tx, messages_rx) = mpsc::channel(transport.message_buffer_size.max(1));
        let (errors_tx, errors_rx) = mpsc::channel(transport.error_buffer_size.max(1));
        let token = self.shutdown.child_token();
        link_cancellation(cancel, token.clone());

        let (keepalive, pong) =
            KeepaliveMonitor::new(connection.clone(), KeepaliveSettings::from(transport))
                .start(errors_tx.clone(), token.clone());

        let reader = InboundReader::new(
            stream,
            connection.clone(),
            self.pending.clone(),
            messages_tx,
            errors_tx.clone(),
            pong,
            &self.config.name,
        );

        let link = Link {
            connection: connection.clone(),
            keepalive,
            errors: errors_tx,
            token: token.clone(),
        };
        if self.wire.link.set(link).is_err() {
            token.cancel();
            connection.close().await?;
            return Err(ExchangeError::AlreadyServing);
        }

        // close() may have run while we were dialing
        if self.shutdown.is_cancelled() {
            connection.close().await?;
            return Err(ExchangeError::SessionClosed);
        }

        tokio::spawn(reader.run(token));
        info!("session serving");
        Ok((messages_rx, errors_rx))
    }

    /// Authenticate `request`, assign it a fresh correlation id and queue
    /// it for the wire. Returns the id.
    ///
    /// Does not wait for a response; anything the server answers arrives
    /// on the message source.
    #[instrument(skip_all, fields(exchange = %self.config.name, method = %request.method()))]
    pub async fn send(&self, request: Request) -> Result<String, ExchangeError> {
        if self.shutdown.is_cancelled() {
            return Err(ExchangeError::SessionClosed);
        }
        let prepared = self.prepare(request).await?;
        self.enqueue(prepared).await
    }

    /// Send `request` and wait for the frame carrying its id.
    ///
    /// The raw frame is returned as is; a response with an error object is
    /// still a successful call at this level.
    #[instrument(skip_all, fields(exchange = %self.config.name, method = %request.method()))]
    pub async fn call(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ExchangeError> {
        if self.shutdown.is_cancelled() {
            return Err(ExchangeError::SessionClosed);
        }
        if !self.wire.is_live() {
            return Err(ExchangeError::NotConnected);
        }

        let prepared = self.prepare(request).await?;
        let id = prepared.id.clone();
        let response = self.pending.register(&id);
        let _guard = PendingGuard::new(self.pending.clone(), id.clone());
        self.enqueue(prepared).await?;

        // a result already delivered by the reader wins over teardown
        tokio::select! {
            biased;
            reply = response => match reply {
                Ok(reply) => reply,
                Err(_) => Err(ExchangeError::ConnectionClosed(
                    "response waiter dropped".to_string(),
                )),
            },
            () = self.shutdown.cancelled() => Err(ExchangeError::SessionClosed),
            () = cancel.cancelled() => Err(ExchangeError::Cancelled),
            () = tokio::time::sleep(self.config.transport.request_timeout) => {
                Err(ExchangeError::RequestTimeout(id))
            }
        }
    }

    /// One-shot control call: serve, call, close.
    pub async fn control_call(
        config: SessionConfig,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, ExchangeError> {
        let session = Self::new(config);
        let (_messages, mut errors) = session.serve(cancel.clone()).await?;

        let result = tokio::select! {
            result = session.call(request, &cancel) => result,
            Some(err) = errors.recv() => Err(err),
        };

        session.close().await?;
        result
    }

    /// Stop the writer, then close the connection. Safe to call repeatedly
    /// and on a session that never served.
    #[instrument(skip(self), fields(exchange = %self.config.name))]
    pub async fn close(&self) -> Result<(), ExchangeError> {
        self.shutdown.cancel();
        if let Some(writer) = self.writer.get() {
            writer.shutdown().await;
        }
        if let Some(link) = self.wire.link.get() {
            link.connection.close().await?;
        }
        Ok(())
    }

    /// Whether the session can still carry calls
    pub fn is_alive(&self) -> bool {
        !self.shutdown.is_cancelled() && self.wire.is_live()
    }

    pub fn keepalive_state(&self) -> Option<KeepaliveState> {
        self.wire.link.get().map(|link| link.keepalive.state())
    }

    pub fn connection_stats(&self) -> Option<&ConnectionStats> {
        self.wire.link.get().map(|link| link.connection.stats())
    }

    /// Control calls still waiting for their response
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn enqueue(&self, prepared: WireRequest) -> Result<String, ExchangeError> {
        let frame = encode_request(&prepared)?;
        let id = prepared.id;
        self.writer()
            .await
            .enqueue(Outbound {
                id: id.clone(),
                frame,
            })
            .await?;
        debug!(%id, "request queued");
        Ok(id)
    }

    async fn writer(&self) -> &OutboundWriter {
        self.writer
            .get_or_init(|| async {
                let transport = &self.config.transport;
                OutboundWriter::start(
                    self.wire.clone(),
                    self.pending.clone(),
                    transport.write_queue_capacity,
                    transport.enqueue_timeout,
                    self.shutdown.child_token(),
                    &self.config.name,
                )
            })
            .await
    }

    /// Inject the API key, timestamp and signature the auth mode asks for
    async fn prepare(&self, request: Request) -> Result<WireRequest, ExchangeError> {
        let (method, auth, mut params) = request.into_parts();

        if auth.requires_api_key() {
            if !self.config.has_api_key() {
                return Err(ExchangeError::AuthenticationRequired(format!(
                    "{} needs an API key",
                    method
                )));
            }
            params.insert("apiKey".to_string(), self.config.api_key().into());
        }

        if auth.requires_signature() {
            if !self.config.has_credentials() {
                return Err(ExchangeError::AuthenticationRequired(format!(
                    "{} needs a signing secret",
                    method
                )));
            }
            params.remove("signature");
            params.insert(
                "timestamp".to_string(),
                ParamValue::Int(self.timestamp_ms()),
            );
            let signature = self.signer().await?.sign(&canonicalize(&params))?;
            params.insert("signature".to_string(), signature.into());
        }

        Ok(WireRequest {
            id: Uuid::new_v4().to_string(),
            method,
            params,
        })
    }

    async fn signer(&self) -> Result<&Arc<dyn Signer>, ExchangeError> {
        self.signer
            .get_or_try_init(|| async {
                signer_for(self.config.key_type, self.config.secret_key())
                    .map_err(ExchangeError::from)
            })
            .await
    }

    fn timestamp_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() + self.config.time_offset_ms
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.config.endpoint)
            .field("alive", &self.is_alive())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

/// Cancel the connection when the caller's token fires
fn link_cancellation(cancel: CancellationToken, connection: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            () = cancel.cancelled() => connection.cancel(),
            () = connection.cancelled() => {}
        }
    });
}
