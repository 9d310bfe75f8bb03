//! Job types for the processing side of the pipeline

use crate::models::price::PriceEvent;
use crate::queue::LogRecord;
use serde::{Deserialize, Serialize};

/// A price update pulled off the message log, owned by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub symbol: String,
    pub price: String,
}

impl Job {
    pub fn new(symbol: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: price.into(),
        }
    }

    /// Key is the symbol and value the price. Records missing either are unusable.
    pub fn from_record(record: &LogRecord) -> Option<Self> {
        let symbol = record.key.as_deref().filter(|k| !k.is_empty())?;
        let price = record.value.as_deref()?;
        Some(Self::new(symbol, price))
    }
}

impl From<PriceEvent> for Job {
    fn from(event: PriceEvent) -> Self {
        Self {
            symbol: event.symbol,
            price: event.price,
        }
    }
}
