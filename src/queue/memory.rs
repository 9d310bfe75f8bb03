//! In-process message log with Kafka-like partitioning.
//!
//! Records are retained for the life of the log. Subscribers are woken through
//! a `watch` channel carrying a publish counter.

use crate::errors::{PipelineError, Result};
use crate::queue::{Delivery, LogRecord, LogSubscription, MessageLog, StartOffset};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// FNV-1a, the same family Sarama's hash partitioner uses
pub fn partition_for(key: &str, partitions: usize) -> i32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    (hash as usize % partitions.max(1)) as i32
}

struct Inner {
    partitions: usize,
    topics: RwLock<HashMap<String, Vec<Vec<(String, String)>>>>,
    published: watch::Sender<u64>,
    failures_pending: AtomicUsize,
    attempts: AtomicUsize,
}

#[derive(Clone)]
pub struct InMemoryLog {
    inner: Arc<Inner>,
}

impl InMemoryLog {
    pub fn new(partitions: usize) -> Self {
        let (published, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                partitions: partitions.max(1),
                topics: RwLock::new(HashMap::new()),
                published,
                failures_pending: AtomicUsize::new(0),
                attempts: AtomicUsize::new(0),
            }),
        }
    }

    /// Reject the next `count` publish attempts
    pub fn fail_next_publishes(&self, count: usize) {
        self.inner.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Total publish calls, including rejected ones
    pub fn publish_attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub async fn records(&self, topic: &str, partition: i32) -> Vec<LogRecord> {
        let topics = self.inner.topics.read().await;
        topics
            .get(topic)
            .and_then(|parts| parts.get(partition as usize))
            .map(|records| {
                records
                    .iter()
                    .enumerate()
                    .map(|(offset, (key, value))| LogRecord {
                        key: Some(key.clone()),
                        value: Some(value.clone()),
                        partition,
                        offset: offset as i64,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn partition_len(&self, topic: &str, partition: i32) -> i64 {
        let topics = self.inner.topics.read().await;
        topics
            .get(topic)
            .and_then(|parts| parts.get(partition as usize))
            .map(|records| records.len() as i64)
            .unwrap_or(0)
    }

    async fn read_at(&self, topic: &str, partition: i32, offset: i64) -> Option<LogRecord> {
        let topics = self.inner.topics.read().await;
        let (key, value) = topics
            .get(topic)?
            .get(partition as usize)?
            .get(usize::try_from(offset).ok()?)?;
        Some(LogRecord {
            key: Some(key.clone()),
            value: Some(value.clone()),
            partition,
            offset,
        })
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl MessageLog for InMemoryLog {
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<Delivery> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .inner
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PipelineError::Publish("broker unavailable".to_string()));
        }

        let partition = partition_for(key, self.inner.partitions);
        let offset = {
            let mut topics = self.inner.topics.write().await;
            let parts = topics
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new(); self.inner.partitions]);
            let records = &mut parts[partition as usize];
            records.push((key.to_string(), value.to_string()));
            records.len() as i64 - 1
        };
        self.inner.published.send_modify(|count| *count += 1);

        Ok(Delivery { partition, offset })
    }

    async fn consume(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<Box<dyn LogSubscription>> {
        if partition < 0 || partition as usize >= self.inner.partitions {
            return Err(PipelineError::Consume(format!(
                "partition {} out of range (0..{})",
                partition, self.inner.partitions
            )));
        }

        let offset = match start {
            StartOffset::Beginning => 0,
            StartOffset::Latest => self.partition_len(topic, partition).await,
            StartOffset::At(offset) => offset.max(0),
        };

        Ok(Box::new(MemorySubscription {
            log: self.clone(),
            updates: self.inner.published.subscribe(),
            topic: topic.to_string(),
            partition,
            offset,
        }))
    }
}

struct MemorySubscription {
    log: InMemoryLog,
    updates: watch::Receiver<u64>,
    topic: String,
    partition: i32,
    offset: i64,
}

#[async_trait]
impl LogSubscription for MemorySubscription {
    async fn next_record(&mut self) -> Option<Result<LogRecord>> {
        loop {
            self.updates.borrow_and_update();
            if let Some(record) = self.log.read_at(&self.topic, self.partition, self.offset).await {
                self.offset += 1;
                return Some(Ok(record));
            }
            if self.updates.changed().await.is_err() {
                return None;
            }
        }
    }
}
