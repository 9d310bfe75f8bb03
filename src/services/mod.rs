//! External-facing services: the exchange feed and the ingestion path.

pub mod binance;
pub mod feed;
pub mod ingest;

pub use binance::BinanceFeed;
pub use feed::{FeedSubscription, PriceFeedHandler};
pub use ingest::{IngestReport, IngestService, Ingestor};
