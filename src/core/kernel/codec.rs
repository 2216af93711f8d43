use crate::core::errors::ExchangeError;
use crate::core::types::{WireRequest, WsApiResponse};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Serialize a control-call request as one JSON text frame
pub fn encode_request(request: &WireRequest) -> Result<String, ExchangeError> {
    Ok(serde_json::to_string(request)?)
}

#[derive(Deserialize)]
struct IdProbe {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// Correlation id carried by an inbound frame, if it has one.
///
/// Only string ids can belong to requests sent by this crate; numeric ids
/// (stream subscription acks) and push events without an id yield `None`.
pub fn response_id(frame: &[u8]) -> Option<String> {
    let probe: IdProbe = serde_json::from_slice(frame).ok()?;
    match probe.id? {
        serde_json::Value::String(id) => Some(id),
        _ => None,
    }
}

/// Decode a control-call response, turning an error object into `ApiError`
pub fn decode_response<T: DeserializeOwned>(frame: &[u8]) -> Result<T, ExchangeError> {
    let response: WsApiResponse<T> = serde_json::from_slice(frame)?;
    if let Some(error) = response.error {
        return Err(ExchangeError::ApiError {
            code: error.code,
            message: error.msg,
        });
    }
    response.result.ok_or_else(|| {
        ExchangeError::DeserializationError(format!(
            "response with status {} carries neither result nor error",
            response.status
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Params;
    use serde_json::{json, Value};

    #[test]
    fn test_encode_request() {
        let mut params = Params::new();
        params.insert("symbol".to_string(), "BNBUSDT".into());
        let request = WireRequest {
            id: "5494febb".to_string(),
            method: "ticker.price".to_string(),
            params,
        };
        let frame = encode_request(&request).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({"id": "5494febb", "method": "ticker.price", "params": {"symbol": "BNBUSDT"}})
        );
    }

    #[test]
    fn test_response_id() {
        assert_eq!(
            response_id(br#"{"id":"abc","status":200,"result":{}}"#),
            Some("abc".to_string())
        );
        assert_eq!(response_id(br#"{"result":null,"id":1}"#), None);
        assert_eq!(response_id(br#"{"e":"trade","s":"BTCUSDT"}"#), None);
        assert_eq!(response_id(br#"[1,2,3]"#), None);
        assert_eq!(response_id(b"not json"), None);
    }

    #[test]
    fn test_decode_response_result() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ServerTime {
            server_time: u64,
        }

        let frame = br#"{"id":"a","status":200,"result":{"serverTime":1656400526260}}"#;
        let time: ServerTime = decode_response(frame).unwrap();
        assert_eq!(time.server_time, 1_656_400_526_260);
    }

    #[test]
    fn test_decode_response_error() {
        let frame = br#"{"id":"a","status":400,"error":{"code":-1102,"msg":"Mandatory parameter 'symbol' was not sent"}}"#;
        let err = decode_response::<Value>(frame).unwrap_err();
        assert!(matches!(err, ExchangeError::ApiError { code: -1102, .. }));
    }
}
