mod common;

use binance_wsapi::exchanges::binance::{Ping, TickerPriceService};
use binance_wsapi::{AuthMode, ExchangeError, Request, WsApiClient, WsApiResponse};
use common::{Behavior, MockServer};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Echoed {
    method: String,
    params: Value,
}

#[cfg(test)]
mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_share_one_connection() {
        let server = MockServer::start(Behavior::Echo).await;
        let client = WsApiClient::new(server.config());

        for symbol in ["BTCUSDT", "ETHUSDT", "BNBUSDT"] {
            let request = Request::new("ticker.price", AuthMode::None).param("symbol", symbol);
            let echoed: Echoed = client.call_json(request).await.unwrap();
            assert_eq!(echoed.method, "ticker.price");
            assert_eq!(echoed.params["symbol"], symbol);
        }

        assert_eq!(server.connections(), 1);
        client.close().await.unwrap();
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_error_object_becomes_api_error() {
        let server = MockServer::start(Behavior::Echo).await;
        let client = WsApiClient::new(server.config());

        let err = client
            .call_json::<Value>(Request::new("fail", AuthMode::None))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ApiError { code: -1102, .. }));

        // protocol errors leave the session usable
        let frame = client.call(Request::new("ping", AuthMode::None)).await.unwrap();
        let response: WsApiResponse = serde_json::from_slice(&frame).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.rate_limits.len(), 1);
        assert_eq!(response.rate_limits[0].rate_limit_type, "REQUEST_WEIGHT");
        assert_eq!(server.connections(), 1);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_dead_session_is_replaced() {
        let server = MockServer::start(Behavior::CloseAfterFirst).await;
        let client = WsApiClient::new(server.config());

        let first = client.call(Request::new("ping", AuthMode::None)).await;
        assert!(first.unwrap_err().is_transport());

        let second = client.call(Request::new("ping", AuthMode::None)).await;
        assert!(second.unwrap_err().is_transport());

        assert_eq!(server.connections(), 2);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_service() {
        let mut server = MockServer::start(Behavior::Echo).await;
        let client = WsApiClient::new(server.config());

        // Echo answers with {"method", "params"}, which the Empty result ignores
        client.execute(Ping).await.unwrap();
        assert_eq!(server.next_request().await["method"], "ping");

        let err = client
            .execute(TickerPriceService::new("BTCUSDT"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::JsonError(_)));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_call_without_secret() {
        let server = MockServer::start(Behavior::Echo).await;
        let client = WsApiClient::new(
            binance_wsapi::SessionConfig::read_only().endpoint(server.url.clone()),
        );

        let err = client
            .call(Request::new("account.status", AuthMode::Signed))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        client.close().await.unwrap();
    }
}
