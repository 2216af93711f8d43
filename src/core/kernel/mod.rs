/// Session kernel - the transport pieces behind a WebSocket API session
///
/// The kernel knows nothing about individual endpoints. It turns a
/// [`Request`](crate::core::types::Request) into a signed JSON frame, moves
/// frames over a single WebSocket connection, and routes what comes back.
///
/// # Architecture
///
/// One connection per session, served by three tasks:
///
/// ## Outbound
/// - `OutboundWriter`: bounded queue with a single consumer; the only code
///   path that writes request frames to the wire
///
/// ## Inbound
/// - `InboundReader`: the only consumer of the receive half. Responses go to
///   the waiting call (`PendingRequests`), everything else to the message
///   channel
///
/// ## Liveness
/// - `KeepaliveMonitor`: pings on an interval, watches pongs, and kills the
///   connection when the peer goes silent
///
/// ## Authentication
/// - `canonicalize`: the exact byte string that gets signed
/// - `Signer`: `HmacSigner`, `RsaSigner` and `Ed25519Signer`
///
/// # Usage
///
/// ## Signing a parameter set
/// ```rust,no_run
/// use binance_wsapi::core::config::KeyType;
/// use binance_wsapi::core::kernel::{canonicalize, signer_for};
/// use binance_wsapi::core::types::Params;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut params = Params::new();
/// params.insert("symbol".to_string(), "BTCUSDT".into());
/// params.insert("timestamp".to_string(), 1_700_000_000_000_i64.into());
///
/// let signer = signer_for(KeyType::Hmac, "secret")?;
/// let signature = signer.sign(&canonicalize(&params))?;
/// # Ok(())
/// # }
/// ```
///
/// ## Opening a raw connection
/// ```rust,no_run
/// use binance_wsapi::core::kernel::Connection;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (connection, _reader) = Connection::open(
///     "wss://ws-api.binance.com:443/ws-api/v3",
///     "binance",
///     Duration::from_secs(10),
/// )
/// .await?;
/// connection.close().await?;
/// # Ok(())
/// # }
/// ```
pub mod canonical;
pub mod codec;
pub mod keepalive;
pub mod reader;
pub mod signer;
pub mod writer;
pub mod ws;

pub use canonical::canonicalize;
pub use codec::{decode_response, encode_request, response_id};
pub use keepalive::{
    KeepaliveExit, KeepaliveHandle, KeepaliveMonitor, KeepaliveSettings, KeepaliveState,
    PongObserver,
};
pub use reader::{InboundReader, PendingGuard, PendingRequests};
pub use signer::{signer_for, Ed25519Signer, HmacSigner, RsaSigner, Signer};
pub use writer::{Outbound, OutboundWriter};
pub use ws::{Connection, ConnectionStats, WsReader};
