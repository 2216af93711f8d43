use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// How a request proves who sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthMode {
    /// Public request, nothing injected.
    #[default]
    None,
    /// `apiKey` parameter only.
    ApiKey,
    /// `apiKey`, `timestamp` and a `signature` over all other parameters.
    Signed,
}

impl AuthMode {
    pub const fn requires_api_key(self) -> bool {
        matches!(self, Self::ApiKey | Self::Signed)
    }

    pub const fn requires_signature(self) -> bool {
        matches!(self, Self::Signed)
    }
}

/// A single request parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) => f.write_str(v),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "\"{}\"", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(v: Vec<&str>) -> Self {
        Self::List(v.into_iter().map(str::to_string).collect())
    }
}

/// Parameter mapping; insertion order carries no meaning.
pub type Params = HashMap<String, ParamValue>;

/// A WebSocket API request before it is submitted to a session.
///
/// The correlation id is not part of the request: the session assigns one
/// when the request is sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    method: String,
    auth: AuthMode,
    params: Params,
}

impl Request {
    pub fn new(method: impl Into<String>, auth: AuthMode) -> Self {
        Self {
            method: method.into(),
            auth,
            params: Params::new(),
        }
    }

    /// Builder-style parameter setter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set_param(key, value);
        self
    }

    /// Sets the parameter only when a value is present
    pub fn param_opt<V: Into<ParamValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn set_params<K, V, I>(&mut self, params: I)
    where
        K: Into<String>,
        V: Into<ParamValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in params {
            self.set_param(k, v);
        }
    }

    pub fn set_method(&mut self, method: impl Into<String>, auth: AuthMode) {
        self.method = method.into();
        self.auth = auth;
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub const fn auth(&self) -> AuthMode {
        self.auth
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub(crate) fn into_parts(self) -> (String, AuthMode, Params) {
        (self.method, self.auth, self.params)
    }
}

/// Client to server control-call frame.
#[derive(Debug, Clone, Serialize)]
pub struct WireRequest {
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

/// Server to client control-call frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsApiResponse<T = Value> {
    pub id: Option<String>,
    pub status: u16,
    pub result: Option<T>,
    pub error: Option<ApiErrorBody>,
    #[serde(default)]
    pub rate_limits: Vec<RateLimit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub rate_limit_type: String,
    pub interval: String,
    pub interval_num: u32,
    pub limit: u32,
    #[serde(default)]
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_value_display() {
        assert_eq!(ParamValue::from("BTCUSDT").to_string(), "BTCUSDT");
        assert_eq!(ParamValue::from(5000_u64).to_string(), "5000");
        assert_eq!(ParamValue::from(-3_i64).to_string(), "-3");
        assert_eq!(ParamValue::from(0.001).to_string(), "0.001");
        assert_eq!(ParamValue::from(true).to_string(), "true");
        assert_eq!(
            ParamValue::from(vec!["BTCUSDT", "ETHUSDT"]).to_string(),
            r#"["BTCUSDT","ETHUSDT"]"#
        );
        assert_eq!(ParamValue::List(Vec::new()).to_string(), "[]");
    }

    #[test]
    fn test_request_builder() {
        let mut request = Request::new("ticker.price", AuthMode::None)
            .param("symbol", "BTCUSDT")
            .param_opt("limit", None::<u32>)
            .param_opt("recvWindow", Some(5000_u32));
        assert_eq!(request.method(), "ticker.price");
        assert_eq!(request.params().len(), 2);

        request.set_method("order.place", AuthMode::Signed);
        assert_eq!(request.method(), "order.place");
        assert_eq!(request.auth(), AuthMode::Signed);
    }

    #[test]
    fn test_wire_request_omits_empty_params() {
        let wire = WireRequest {
            id: "abc".to_string(),
            method: "ping".to_string(),
            params: Params::new(),
        };
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"id": "abc", "method": "ping"})
        );
    }

    #[test]
    fn test_response_envelope() {
        let raw = json!({
            "id": "922bcc6e",
            "status": 400,
            "error": {"code": -2010, "msg": "Account has insufficient balance"},
            "rateLimits": [{
                "rateLimitType": "ORDERS",
                "interval": "SECOND",
                "intervalNum": 10,
                "limit": 50,
                "count": 1
            }]
        });
        let response: WsApiResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.status, 400);
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -2010);
        assert_eq!(response.rate_limits[0].limit, 50);
    }
}
