use crate::core::{errors::ExchangeError, types::Request};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// A WebSocket API endpoint builder.
///
/// Builders only collect parameters and choose a method name and
/// authentication mode; sessions do everything else.
pub trait WsApiService {
    /// Payload of the `result` field in a successful response
    type Response: DeserializeOwned;

    fn into_request(self) -> Request;
}

/// Protocol-level ping write, used by the keepalive monitor
#[async_trait]
pub trait Pinger: Send + Sync + 'static {
    async fn ping(&self, payload: Vec<u8>) -> Result<(), ExchangeError>;
}

/// Destination of the outbound writer's frames
#[async_trait]
pub trait FrameSink: Send + Sync + 'static {
    /// Whether a live connection is available right now
    fn is_live(&self) -> bool;

    async fn write_text(&self, frame: String) -> Result<(), ExchangeError>;
}
