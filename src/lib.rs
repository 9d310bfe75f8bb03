//! dipwatch: price feed ingestion and sliding-window dip detection
//!
//! The ingestor republishes exchange ticks onto a message log and caches the
//! latest price. The processor consumes the log into a bounded job queue that a
//! fixed worker pool drains, keeping a per-symbol price window in the shared
//! store and flagging dips against its moving average.

pub mod cache;
pub mod config;
pub mod core;
pub mod errors;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod services;
pub mod strategies;
