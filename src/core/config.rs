use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WS_API_URL: &str = "wss://ws-api.binance.com:443/ws-api/v3";
pub const TESTNET_WS_API_URL: &str = "wss://ws-api.testnet.binance.vision/ws-api/v3";

/// Signature scheme used for `Signed` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    #[default]
    Hmac,
    Rsa,
    Ed25519,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hmac => "HMAC",
            Self::Rsa => "RSA",
            Self::Ed25519 => "ED25519",
        };
        f.write_str(name)
    }
}

impl FromStr for KeyType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HMAC" => Ok(Self::Hmac),
            "RSA" => Ok(Self::Rsa),
            "ED25519" => Ok(Self::Ed25519),
            other => Err(ConfigError::InvalidConfiguration(format!(
                "Unsupported key type: {}",
                other
            ))),
        }
    }
}

/// Fixed transport constants, shared by every task of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Keepalive tick
    pub ping_interval: Duration,
    /// Write deadline for a single ping frame
    pub ping_timeout: Duration,
    /// Maximum peer silence before the connection is considered dead
    pub liveness_window: Duration,
    pub write_queue_capacity: usize,
    pub enqueue_timeout: Duration,
    pub message_buffer_size: usize,
    pub error_buffer_size: usize,
    /// How long a control call waits for its response
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            liveness_window: Duration::from_secs(60),
            write_queue_capacity: 100,
            enqueue_timeout: Duration::from_secs(5),
            message_buffer_size: 1000,
            error_buffer_size: 16,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: String,
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
    pub key_type: KeyType,
    pub testnet: bool,
    /// Label recorded on every transport span
    pub name: String,
    /// Added to the local clock when stamping signed requests
    pub time_offset_ms: i64,
    pub transport: TransportConfig,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for SessionConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SessionConfig", 8)?;
        state.serialize_field("endpoint", &self.endpoint)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field("key_type", &self.key_type)?;
        state.serialize_field("testnet", &self.testnet)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("time_offset_ms", &self.time_offset_ms)?;
        state.serialize_field("transport", &self.transport)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for SessionConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct SessionConfigHelper {
            endpoint: Option<String>,
            #[serde(default)]
            api_key: String,
            #[serde(default)]
            secret_key: String,
            #[serde(default)]
            key_type: KeyType,
            #[serde(default)]
            testnet: bool,
            name: Option<String>,
            #[serde(default)]
            time_offset_ms: i64,
            #[serde(default)]
            transport: Option<TransportConfig>,
        }

        let helper = SessionConfigHelper::deserialize(deserializer)?;
        let mut config = Self::new(helper.api_key, helper.secret_key)
            .key_type(helper.key_type)
            .testnet(helper.testnet)
            .time_offset_ms(helper.time_offset_ms);
        if let Some(endpoint) = helper.endpoint {
            config = config.endpoint(endpoint);
        }
        if let Some(name) = helper.name {
            config = config.name(name);
        }
        if let Some(transport) = helper.transport {
            config = config.transport(transport);
        }
        Ok(config)
    }
}

impl SessionConfig {
    /// Create a new configuration with API credentials and HMAC signing
    #[must_use]
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_WS_API_URL.to_string(),
            api_key: Secret::new(api_key.into()),
            secret_key: Secret::new(secret_key.into()),
            key_type: KeyType::Hmac,
            testnet: false,
            name: "binance".to_string(),
            time_offset_ms: 0,
            transport: TransportConfig::default(),
        }
    }

    /// Configuration for public requests and market streams only
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new())
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY`
    /// - `{PREFIX}_SECRET_KEY` (HMAC secret, or a PKCS#8 PEM private key)
    /// - `{PREFIX}_KEY_TYPE` (optional, `HMAC`, `RSA` or `ED25519`, defaults to HMAC)
    /// - `{PREFIX}_TESTNET` (optional, defaults to false)
    /// - `{PREFIX}_WS_API_URL` (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let api_key_var = format!("{}_API_KEY", prefix);
        let secret_key_var = format!("{}_SECRET_KEY", prefix);

        let api_key = env::var(&api_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(api_key_var))?;
        let secret_key = env::var(&secret_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(secret_key_var))?;

        let key_type = match env::var(format!("{}_KEY_TYPE", prefix)) {
            Ok(value) => value.parse()?,
            Err(_) => KeyType::Hmac,
        };

        let testnet = env::var(format!("{}_TESTNET", prefix))
            .map(|v| v.parse::<bool>().unwrap_or(false))
            .unwrap_or(false);

        let mut config = Self::new(api_key, secret_key)
            .key_type(key_type)
            .testnet(testnet);
        if let Ok(endpoint) = env::var(format!("{}_WS_API_URL", prefix)) {
            config = config.endpoint(endpoint);
        }
        Ok(config)
    }

    /// Create configuration from a `.env` file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific `.env` file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // fall back to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Switch between production and testnet.
    ///
    /// The endpoint follows unless it was customised.
    #[must_use]
    pub fn testnet(mut self, testnet: bool) -> Self {
        if self.endpoint == DEFAULT_WS_API_URL || self.endpoint == TESTNET_WS_API_URL {
            self.endpoint = if testnet {
                TESTNET_WS_API_URL
            } else {
                DEFAULT_WS_API_URL
            }
            .to_string();
        }
        self.testnet = testnet;
        self
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub const fn key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn time_offset_ms(mut self, offset: i64) -> Self {
        self.time_offset_ms = offset;
        self
    }

    #[must_use]
    pub const fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }

    pub fn has_credentials(&self) -> bool {
        self.has_api_key() && !self.secret_key.expose_secret().is_empty()
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret key (use carefully - exposes secret)
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::read_only();
        assert_eq!(config.endpoint, DEFAULT_WS_API_URL);
        assert_eq!(config.key_type, KeyType::Hmac);
        assert!(!config.has_credentials());
        assert_eq!(config.transport.enqueue_timeout, Duration::from_secs(5));
        assert_eq!(config.transport.liveness_window, Duration::from_secs(60));
    }

    #[test]
    fn test_testnet_switches_default_endpoint_only() {
        let config = SessionConfig::read_only().testnet(true);
        assert_eq!(config.endpoint, TESTNET_WS_API_URL);

        let custom = SessionConfig::read_only()
            .endpoint("ws://127.0.0.1:9000")
            .testnet(true);
        assert_eq!(custom.endpoint, "ws://127.0.0.1:9000");
        assert!(custom.testnet);
    }

    #[test]
    fn test_key_type_parsing() {
        assert_eq!("hmac".parse::<KeyType>().unwrap(), KeyType::Hmac);
        assert_eq!("RSA".parse::<KeyType>().unwrap(), KeyType::Rsa);
        assert_eq!(" Ed25519 ".parse::<KeyType>().unwrap(), KeyType::Ed25519);
        assert!("ecdsa".parse::<KeyType>().is_err());
    }

    #[test]
    fn test_serialize_redacts_secrets() {
        let config = SessionConfig::new("my-key", "my-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("my-key"));
        assert!(!json.contains("my-secret"));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"api_key": "k", "secret_key": "s", "key_type": "ED25519", "testnet": true}"#,
        )
        .unwrap();
        assert_eq!(config.api_key(), "k");
        assert_eq!(config.key_type, KeyType::Ed25519);
        assert_eq!(config.endpoint, TESTNET_WS_API_URL);
        assert_eq!(config.name, "binance");
    }

    #[test]
    fn test_from_env() {
        env::set_var("WSAPI_CFG_TEST_API_KEY", "env-key");
        env::set_var("WSAPI_CFG_TEST_SECRET_KEY", "env-secret");
        env::set_var("WSAPI_CFG_TEST_KEY_TYPE", "rsa");
        let config = SessionConfig::from_env("wsapi_cfg_test").unwrap();
        assert_eq!(config.api_key(), "env-key");
        assert_eq!(config.key_type, KeyType::Rsa);

        assert!(matches!(
            SessionConfig::from_env("WSAPI_CFG_MISSING"),
            Err(ConfigError::MissingEnvironmentVariable(_))
        ));
    }
}
