use super::types::{
    StreamAggTrade, StreamBookTicker, StreamDepthUpdate, StreamKline, StreamPartialDepth,
    StreamTicker, StreamTrade, SubscriptionType,
};
use crate::core::errors::ExchangeError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

pub const STREAM_URL: &str = "wss://stream.binance.com:9443";
pub const TESTNET_STREAM_URL: &str = "wss://stream.testnet.binance.vision";

#[derive(Debug, Clone)]
pub enum BinanceStreamEvent {
    Ticker(StreamTicker),
    BookTicker(StreamBookTicker),
    Trade(StreamTrade),
    AggTrade(StreamAggTrade),
    DepthUpdate(StreamDepthUpdate),
    PartialDepth(StreamPartialDepth),
    Kline(StreamKline),
    Unknown(Value),
}

/// Combined-stream envelope
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFrame {
    pub stream: String,
    pub data: Value,
}

/// Create stream names such as `btcusdt@kline_1m`
pub fn stream_identifiers(
    symbols: &[String],
    subscription_types: &[SubscriptionType],
) -> Vec<String> {
    let mut streams = Vec::new();

    for symbol in symbols {
        let lower_symbol = symbol.to_lowercase();
        for sub_type in subscription_types {
            match sub_type {
                SubscriptionType::Ticker => streams.push(format!("{}@ticker", lower_symbol)),
                SubscriptionType::BookTicker => {
                    streams.push(format!("{}@bookTicker", lower_symbol));
                }
                SubscriptionType::OrderBook { depth } => {
                    if let Some(d) = depth {
                        streams.push(format!("{}@depth{}@100ms", lower_symbol, d));
                    } else {
                        streams.push(format!("{}@depth@100ms", lower_symbol));
                    }
                }
                SubscriptionType::Trades => streams.push(format!("{}@trade", lower_symbol)),
                SubscriptionType::AggTrades => streams.push(format!("{}@aggTrade", lower_symbol)),
                SubscriptionType::Klines { interval } => {
                    streams.push(format!("{}@kline_{}", lower_symbol, interval.as_str()));
                }
            }
        }
    }

    streams
}

/// `{base}/ws/{stream}`: frames arrive bare
pub fn raw_stream_url(base: &str, stream: &str) -> String {
    format!("{}/ws/{}", base.trim_end_matches('/'), stream)
}

/// `{base}/stream?streams=a/b`: frames arrive wrapped in [`StreamFrame`]
pub fn combined_stream_url(base: &str, streams: &[String]) -> String {
    format!(
        "{}/stream?streams={}",
        base.trim_end_matches('/'),
        streams.join("/")
    )
}

/// Decode one stream-mode frame, combined or raw
pub fn decode_stream_frame(frame: &[u8]) -> Result<BinanceStreamEvent, ExchangeError> {
    let value: Value = serde_json::from_slice(frame).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse JSON: {}", e))
    })?;

    if value.get("stream").is_some() {
        let envelope: StreamFrame = parse(value, "stream envelope")?;
        return decode_stream_data(&envelope.stream, envelope.data);
    }

    let event_type = value.get("e").and_then(Value::as_str).map(str::to_string);
    match event_type.as_deref() {
        Some(event_type) => decode_event(event_type, value),
        // bookTicker payloads carry no event type
        None if value.get("u").is_some() && value.get("b").is_some() => {
            parse(value, "book ticker").map(BinanceStreamEvent::BookTicker)
        }
        None if value.get("lastUpdateId").is_some() => {
            parse(value, "partial depth").map(BinanceStreamEvent::PartialDepth)
        }
        None => Ok(BinanceStreamEvent::Unknown(value)),
    }
}

fn decode_stream_data(stream: &str, data: Value) -> Result<BinanceStreamEvent, ExchangeError> {
    if stream.ends_with("@bookTicker") {
        parse(data, "book ticker").map(BinanceStreamEvent::BookTicker)
    } else if stream.contains("@ticker") {
        parse(data, "ticker").map(BinanceStreamEvent::Ticker)
    } else if stream.ends_with("@trade") {
        parse(data, "trade").map(BinanceStreamEvent::Trade)
    } else if stream.ends_with("@aggTrade") {
        parse(data, "agg trade").map(BinanceStreamEvent::AggTrade)
    } else if stream.contains("@depth") {
        if data.get("lastUpdateId").is_some() {
            parse(data, "partial depth").map(BinanceStreamEvent::PartialDepth)
        } else {
            parse(data, "depth update").map(BinanceStreamEvent::DepthUpdate)
        }
    } else if stream.contains("@kline") {
        parse(data, "kline").map(BinanceStreamEvent::Kline)
    } else {
        Ok(BinanceStreamEvent::Unknown(data))
    }
}

fn decode_event(event_type: &str, data: Value) -> Result<BinanceStreamEvent, ExchangeError> {
    match event_type {
        "24hrTicker" => parse(data, "ticker").map(BinanceStreamEvent::Ticker),
        "trade" => parse(data, "trade").map(BinanceStreamEvent::Trade),
        "aggTrade" => parse(data, "agg trade").map(BinanceStreamEvent::AggTrade),
        "depthUpdate" => parse(data, "depth update").map(BinanceStreamEvent::DepthUpdate),
        "kline" => parse(data, "kline").map(BinanceStreamEvent::Kline),
        _ => Ok(BinanceStreamEvent::Unknown(data)),
    }
}

fn parse<T: DeserializeOwned>(data: Value, what: &str) -> Result<T, ExchangeError> {
    serde_json::from_value(data).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse {}: {}", what, e))
    })
}
