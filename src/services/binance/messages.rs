//! Binance WebSocket payloads

use crate::errors::Result;
use crate::models::price::PriceEvent;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

/// 24h rolling ticker (`<symbol>@ticker`). Only the fields we use.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub last_price: String,
}

impl TickerEvent {
    pub fn into_price_event(self) -> PriceEvent {
        let event = PriceEvent::new(self.symbol, self.last_price);
        match DateTime::from_timestamp_millis(self.event_time) {
            Some(ts) => event.with_timestamp(ts),
            None => event,
        }
    }
}

/// Parse a text frame from either a raw or a combined stream.
///
/// Frames that are not ticker events (subscription acks and the like) yield
/// `Ok(None)`.
pub fn parse_ticker(text: &str) -> Result<Option<PriceEvent>> {
    let mut value: Value = serde_json::from_str(text)?;
    if let Some(data) = value.get_mut("data") {
        value = data.take();
    }

    if value.get("e").and_then(Value::as_str) != Some("24hrTicker") {
        return Ok(None);
    }

    let ticker: TickerEvent = serde_json::from_value(value)?;
    Ok(Some(ticker.into_price_event()))
}
