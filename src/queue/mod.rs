//! Message log access: keyed publish and per-partition consumption.

pub mod kafka;
pub mod memory;
pub mod publisher;

pub use kafka::KafkaLog;
pub use memory::InMemoryLog;
pub use publisher::{Publisher, RetryPolicy};

use crate::errors::Result;
use async_trait::async_trait;

/// Where a new subscription starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    Beginning,
    /// Only records published after the subscription is created
    Latest,
    At(i64),
}

/// Broker acknowledgment for a published record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// One record read back from the log.
///
/// Key and value are `None` when absent or not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: Option<String>,
    pub value: Option<String>,
    pub partition: i32,
    pub offset: i64,
}

/// A live read position on one partition.
///
/// `next_record` waits for the next record. It is cancel-safe: dropping the
/// future loses nothing that has not been returned yet.
#[async_trait]
pub trait LogSubscription: Send {
    /// `None` once the subscription can produce nothing more
    async fn next_record(&mut self) -> Option<Result<LogRecord>>;
}

#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Single publish attempt. Partition is chosen by hashing `key`.
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<Delivery>;

    async fn consume(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<Box<dyn LogSubscription>>;
}
