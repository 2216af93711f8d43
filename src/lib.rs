pub mod core;
pub mod exchanges;

pub use crate::core::client::WsApiClient;
pub use crate::core::config::{KeyType, SessionConfig, TransportConfig};
pub use crate::core::session::{ErrorSource, MessageSource, Session};
pub use crate::core::{errors::ExchangeError, traits::WsApiService, types::*};
