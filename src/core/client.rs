use crate::core::config::SessionConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::decode_response;
use crate::core::session::{ErrorSource, MessageSource, Session};
use crate::core::traits::WsApiService;
use crate::core::types::Request;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Control-call client that keeps one session warm.
///
/// Concurrent calls share the live session and are matched to their
/// responses by id. When the session dies, the next call opens a new one;
/// calls that were in flight fail and are not re-sent.
pub struct WsApiClient {
    config: Arc<SessionConfig>,
    active: Mutex<Option<Arc<Session>>>,
}

impl WsApiClient {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config: Arc::new(config),
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The live session, dialing a new one if needed
    #[instrument(skip(self), fields(exchange = %self.config.name))]
    pub async fn session(&self) -> Result<Arc<Session>, ExchangeError> {
        let mut active = self.active.lock().await;
        if let Some(session) = active.as_ref() {
            if session.is_alive() {
                return Ok(session.clone());
            }
        }

        if let Some(stale) = active.take() {
            debug!("replacing dead session");
            if let Err(e) = stale.close().await {
                warn!("failed to close stale session: {}", e);
            }
        }

        let session = Arc::new(Session::with_config(self.config.clone()));
        let (messages, errors) = session.serve(CancellationToken::new()).await?;
        tokio::spawn(watch_session(Arc::downgrade(&session), messages, errors));
        info!("new session ready");

        *active = Some(session.clone());
        Ok(session)
    }

    /// Send `request` and return the raw response frame
    pub async fn call(&self, request: Request) -> Result<Vec<u8>, ExchangeError> {
        self.call_with_cancel(request, &CancellationToken::new())
            .await
    }

    pub async fn call_with_cancel(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ExchangeError> {
        let session = self.session().await?;
        session.call(request, cancel).await
    }

    /// Send `request` and decode the `result` of its response.
    ///
    /// An error object in the response becomes [`ExchangeError::ApiError`].
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        request: Request,
    ) -> Result<T, ExchangeError> {
        let frame = self.call(request).await?;
        decode_response(&frame)
    }

    pub async fn execute<S: WsApiService>(&self, service: S) -> Result<S::Response, ExchangeError> {
        self.call_json(service.into_request()).await
    }

    pub async fn close(&self) -> Result<(), ExchangeError> {
        let session = self.active.lock().await.take();
        match session {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for WsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsApiClient")
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

/// Drain what control calls did not claim and close the session on the
/// first fatal error, so the next call dials again.
async fn watch_session(
    session: Weak<Session>,
    mut messages: MessageSource,
    mut errors: ErrorSource,
) {
    loop {
        tokio::select! {
            Some(frame) = messages.recv() => {
                debug!(bytes = frame.len(), "unsolicited frame on control connection");
            }
            Some(err) = errors.recv() => {
                warn!(error = %err, "session failed");
                if let Some(session) = session.upgrade() {
                    if let Err(e) = session.close().await {
                        debug!("close after failure: {}", e);
                    }
                }
                break;
            }
            else => break,
        }
    }
}
