//! Environment-driven configuration
//!
//! Every setting has a default that matches a local docker-compose setup, so
//! both binaries start without a `.env` file.

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
pub const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";
pub const DEFAULT_TOPIC: &str = "market_data";
pub const DEFAULT_BINANCE_WS_URL: &str = "wss://stream.binance.com:9443";

pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_redis_url() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string())
}

pub fn get_kafka_brokers() -> String {
    env::var("KAFKA_BROKERS").unwrap_or_else(|_| DEFAULT_KAFKA_BROKERS.to_string())
}

pub fn get_kafka_group_id() -> String {
    env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "dipwatch-processor".to_string())
}

pub fn get_topic() -> String {
    env::var("KAFKA_TOPIC").unwrap_or_else(|_| DEFAULT_TOPIC.to_string())
}

pub fn get_binance_ws_url() -> String {
    env::var("BINANCE_WS_URL").unwrap_or_else(|_| DEFAULT_BINANCE_WS_URL.to_string())
}

/// Comma separated list from `SYMBOLS`, upper-cased. Falls back to BTCUSDT.
pub fn get_symbols() -> Vec<String> {
    let symbols = env::var("SYMBOLS")
        .map(|s| parse_symbols(&s))
        .unwrap_or_default();
    if symbols.is_empty() {
        vec!["BTCUSDT".to_string()]
    } else {
        symbols
    }
}

pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn get_metrics_port(default: u16) -> u16 {
    env_or("METRICS_PORT", default)
}

/// Settings for the processor side of the pipeline
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub topic: String,
    pub partition: i32,
    pub workers: usize,
    pub queue_capacity: usize,
    pub window_size: usize,
    pub dip_threshold: f64,
    pub drain_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            partition: 0,
            workers: 5,
            queue_capacity: 100,
            window_size: 10,
            dip_threshold: 0.01,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            topic: get_topic(),
            partition: env_or("KAFKA_PARTITION", defaults.partition),
            workers: env_or("WORKER_COUNT", defaults.workers),
            queue_capacity: env_or("JOB_QUEUE_CAPACITY", defaults.queue_capacity),
            window_size: env_or("WINDOW_SIZE", defaults.window_size),
            dip_threshold: env_or("DIP_THRESHOLD", defaults.dip_threshold),
            drain_timeout: Duration::from_secs(env_or(
                "DRAIN_TIMEOUT_SECONDS",
                defaults.drain_timeout.as_secs(),
            )),
        }
    }
}

/// Settings for the ingestion side of the pipeline
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    pub topic: String,
    pub symbols: Vec<String>,
    pub latest_price_ttl: Duration,
    pub feed_url: String,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            symbols: vec!["BTCUSDT".to_string()],
            latest_price_ttl: Duration::from_secs(600),
            feed_url: DEFAULT_BINANCE_WS_URL.to_string(),
        }
    }
}

impl IngestorConfig {
    pub fn from_env() -> Self {
        Self {
            topic: get_topic(),
            symbols: get_symbols(),
            latest_price_ttl: Duration::from_secs(env_or("LATEST_PRICE_TTL_SECONDS", 600)),
            feed_url: get_binance_ws_url(),
        }
    }
}
