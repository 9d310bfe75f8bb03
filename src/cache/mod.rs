//! Shared price store: latest price per symbol and a capped history list.
//!
//! Every operation is a single-key command against the backend. Callers must
//! not assume two operations run atomically together.

pub mod memory;
pub mod redis_cache;

pub use memory::InMemoryStore;
pub use redis_cache::RedisCache;

use crate::errors::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Staleness bound on `price:{symbol}`
pub const LATEST_PRICE_TTL: Duration = Duration::from_secs(10 * 60);

pub fn latest_key(symbol: &str) -> String {
    format!("price:{}", symbol)
}

pub fn history_key(symbol: &str) -> String {
    format!("history:{}", symbol)
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Overwrite the latest price, expiring after `ttl`
    async fn set_latest(&self, symbol: &str, price: &str, ttl: Duration) -> Result<()>;

    /// `None` when the symbol was never seen or the value expired
    async fn get_latest(&self, symbol: &str) -> Result<Option<String>>;

    /// Push to the head of the history list, returning the new length
    async fn push_history(&self, symbol: &str, price: &str) -> Result<usize>;

    /// Keep only the first `max_len` (newest) entries
    async fn trim_history(&self, symbol: &str, max_len: usize) -> Result<()>;

    /// Whole history, newest first
    async fn read_history(&self, symbol: &str) -> Result<Vec<String>>;
}
