pub mod codec;
pub mod services;
pub mod types;

use crate::core::client::WsApiClient;
use crate::core::config::SessionConfig;
use crate::core::session::Session;

// Re-export main types for easier importing
pub use codec::{
    combined_stream_url, decode_stream_frame, raw_stream_url, stream_identifiers,
    BinanceStreamEvent, StreamFrame, STREAM_URL, TESTNET_STREAM_URL,
};
pub use services::{
    AccountStatusService, Ping, PlaceOrderService, TestOrderService, TickerPriceService,
    TickerPricesService, Time, UserDataStreamStart,
};
pub use types::{
    AccountStatus, Balance, Empty, KlineInterval, ListenKey, OrderResponse, OrderSide, OrderType,
    ServerTime, SubscriptionType, TickerPrice, TimeInForce,
};

/// Create a control-call client for the WebSocket API
pub fn create_binance_client(config: SessionConfig) -> WsApiClient {
    WsApiClient::new(config)
}

/// Create a stream-mode session for the given stream names.
///
/// The session is not connected yet; call [`Session::serve`] and read the
/// message source. Credentials are not needed for market streams.
pub fn create_stream_session(config: &SessionConfig, streams: &[String]) -> Session {
    let base = if config.testnet {
        TESTNET_STREAM_URL
    } else {
        STREAM_URL
    };
    let url = match streams {
        [single] => raw_stream_url(base, single),
        _ => combined_stream_url(base, streams),
    };

    Session::new(config.clone().endpoint(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_session_endpoint() {
        let config = SessionConfig::read_only().testnet(true);
        let session = create_stream_session(
            &config,
            &["btcusdt@trade".to_string(), "ethusdt@trade".to_string()],
        );
        assert_eq!(
            session.config().endpoint,
            "wss://stream.testnet.binance.vision/stream?streams=btcusdt@trade/ethusdt@trade"
        );

        let session = create_stream_session(
            &SessionConfig::read_only(),
            &["bnbusdt@bookTicker".to_string()],
        );
        assert_eq!(
            session.config().endpoint,
            "wss://stream.binance.com:9443/ws/bnbusdt@bookTicker"
        );
    }
}
