//! Binance spot market data

pub mod feed;
pub mod messages;

pub use feed::BinanceFeed;
pub use messages::{parse_ticker, TickerEvent};
