//! Redis-backed price store

use crate::cache::{history_key, latest_key, PriceStore};
use crate::config;
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn store_error(op: &str, key: &str, err: redis::RedisError) -> PipelineError {
    PipelineError::CacheReadWrite(format!("{} {} failed: {}", op, key, err))
}

/// Price store on top of a multiplexed Redis connection.
///
/// `ConnectionManager` is cheap to clone and reconnects on its own, so each
/// call works on a clone instead of holding a lock.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect using `REDIS_URL`
    pub async fn new() -> Result<Self> {
        Self::connect(&config::get_redis_url()).await
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| PipelineError::connect_init("redis", e))?;

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| PipelineError::connect_init("redis", "connection timed out"))?
            .map_err(|e| PipelineError::connect_init("redis", e))?;

        let cache = Self { conn };
        cache
            .ping()
            .await
            .map_err(|e| PipelineError::connect_init("redis", e))?;

        info!("Redis connected");
        Ok(cache)
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("PING", "-", e))?;
        debug!(reply = %reply, "Redis ping");
        Ok(())
    }
}

#[async_trait]
impl PriceStore for RedisCache {
    async fn set_latest(&self, symbol: &str, price: &str, ttl: Duration) -> Result<()> {
        let key = latest_key(symbol);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, price, ttl.as_secs().max(1))
            .await
            .map_err(|e| store_error("SET", &key, e))
    }

    async fn get_latest(&self, symbol: &str) -> Result<Option<String>> {
        let key = latest_key(symbol);
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(&key)
            .await
            .map_err(|e| store_error("GET", &key, e))
    }

    async fn push_history(&self, symbol: &str, price: &str) -> Result<usize> {
        let key = history_key(symbol);
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, usize>(&key, price)
            .await
            .map_err(|e| store_error("LPUSH", &key, e))
    }

    async fn trim_history(&self, symbol: &str, max_len: usize) -> Result<()> {
        let key = history_key(symbol);
        let mut conn = self.conn.clone();
        let stop = max_len as isize - 1;
        conn.ltrim::<_, ()>(&key, 0, stop)
            .await
            .map_err(|e| store_error("LTRIM", &key, e))
    }

    async fn read_history(&self, symbol: &str) -> Result<Vec<String>> {
        let key = history_key(symbol);
        let mut conn = self.conn.clone();
        conn.lrange::<_, Vec<String>>(&key, 0, -1)
            .await
            .map_err(|e| store_error("LRANGE", &key, e))
    }
}
