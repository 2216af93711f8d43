use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("API error: {code} - {message}")]
    ApiError { code: i64, message: String },

    #[error("Signing configuration error: {0}")]
    Signing(#[from] SigningError),

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Ping failed: {0}")]
    PingFailed(String),

    #[error("No pong received for {0:?}")]
    KeepaliveTimeout(Duration),

    #[error("Write queue full: request blocked for {0:?}")]
    Backpressure(Duration),

    #[error("No response for request {0}")]
    RequestTimeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Session is already serving a connection")]
    AlreadyServing,

    #[error("Session has no open connection")]
    NotConnected,

    #[error("Other error: {0}")]
    Other(String),
}

impl ExchangeError {
    /// Configuration problems never go away by retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Signing(_) | Self::ConfigError(_) | Self::AuthenticationRequired(_)
        )
    }

    /// The session that produced this error is dead and must be replaced.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ConnectionTimeout(_)
                | Self::ConnectionClosed(_)
                | Self::PingFailed(_)
                | Self::KeepaliveTimeout(_)
        )
    }
}

/// Failures while turning a configured secret into a working signer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("malformed PEM: {0}")]
    MalformedPem(String),

    #[error("wrong key type: expected {expected}")]
    WrongKeyType { expected: &'static str },

    #[error("failed to parse private key: {0}")]
    KeyParse(String),

    #[error("invalid HMAC secret: {0}")]
    InvalidSecret(String),

    #[error("signing failed: {0}")]
    SignatureFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let signing = ExchangeError::from(SigningError::MalformedPem("no header".to_string()));
        assert!(signing.is_configuration());
        assert!(!signing.is_transport());

        let closed = ExchangeError::ConnectionClosed("eof".to_string());
        assert!(closed.is_transport());
        assert!(!closed.is_configuration());

        let backpressure = ExchangeError::Backpressure(Duration::from_secs(5));
        assert!(!backpressure.is_transport());
        assert!(!backpressure.is_configuration());
    }

    #[test]
    fn test_error_messages() {
        let err = ExchangeError::ApiError {
            code: -1021,
            message: "Timestamp outside recvWindow".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error: -1021 - Timestamp outside recvWindow"
        );

        let err = ExchangeError::from(SigningError::WrongKeyType { expected: "Ed25519" });
        assert_eq!(
            err.to_string(),
            "Signing configuration error: wrong key type: expected Ed25519"
        );
    }
}
