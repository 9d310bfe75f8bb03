//! In-process price store with the same per-key semantics as Redis.
//!
//! Used by tests and local dry runs. Each method takes its lock once, so the
//! push/trim/read sequence interleaves across callers exactly like separate
//! Redis commands would.

use crate::cache::PriceStore;
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Default)]
pub struct InMemoryStore {
    latest: RwLock<HashMap<String, (String, Instant)>>,
    history: RwLock<HashMap<String, VecDeque<String>>>,
    failing: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PipelineError::CacheReadWrite(format!("{} failed: store unavailable", op)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PriceStore for InMemoryStore {
    async fn set_latest(&self, symbol: &str, price: &str, ttl: Duration) -> Result<()> {
        self.check("SET")?;
        let mut latest = self.latest.write().await;
        latest.insert(symbol.to_string(), (price.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get_latest(&self, symbol: &str) -> Result<Option<String>> {
        self.check("GET")?;
        let latest = self.latest.read().await;
        Ok(latest
            .get(symbol)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(price, _)| price.clone()))
    }

    async fn push_history(&self, symbol: &str, price: &str) -> Result<usize> {
        self.check("LPUSH")?;
        let mut history = self.history.write().await;
        let list = history.entry(symbol.to_string()).or_default();
        list.push_front(price.to_string());
        Ok(list.len())
    }

    async fn trim_history(&self, symbol: &str, max_len: usize) -> Result<()> {
        self.check("LTRIM")?;
        let mut history = self.history.write().await;
        if let Some(list) = history.get_mut(symbol) {
            list.truncate(max_len);
            if list.is_empty() {
                history.remove(symbol);
            }
        }
        Ok(())
    }

    async fn read_history(&self, symbol: &str) -> Result<Vec<String>> {
        self.check("LRANGE")?;
        let history = self.history.read().await;
        Ok(history
            .get(symbol)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }
}
