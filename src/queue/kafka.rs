//! Kafka implementation of the message log

use crate::config;
use crate::errors::{PipelineError, Result};
use crate::queue::{Delivery, LogRecord, LogSubscription, MessageLog, StartOffset};
use async_trait::async_trait;
use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::{Message, Offset, TopicPartitionList};
use std::time::Duration;
use tracing::{debug, info};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

pub struct KafkaLog {
    brokers: String,
    group_id: String,
    producer: FutureProducer,
}

impl KafkaLog {
    /// Build from `KAFKA_BROKERS` / `KAFKA_GROUP_ID`
    pub fn new() -> Result<Self> {
        Self::connect(&config::get_kafka_brokers(), &config::get_kafka_group_id())
    }

    pub fn connect(brokers: &str, group_id: &str) -> Result<Self> {
        // Retries live in `Publisher` so the bound is applied in one place.
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("partitioner", "murmur2_random")
            .set("message.send.max.retries", "0")
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| PipelineError::connect_init("kafka", e))?;

        Ok(Self {
            brokers: brokers.to_string(),
            group_id: group_id.to_string(),
            producer,
        })
    }

    /// Fetch topic metadata to prove the brokers are reachable.
    ///
    /// librdkafka connects lazily, so without this a dead broker would only
    /// show up on the first publish.
    pub async fn verify(&self, topic: &str) -> Result<usize> {
        let producer = self.producer.clone();
        let topic_name = topic.to_string();
        let partitions = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic_name), METADATA_TIMEOUT)
                .map(|metadata| {
                    metadata
                        .topics()
                        .iter()
                        .find(|t| t.name() == topic_name)
                        .map(|t| t.partitions().len())
                        .unwrap_or(0)
                })
        })
        .await
        .map_err(|e| PipelineError::connect_init("kafka", e))?
        .map_err(|e| PipelineError::connect_init("kafka", e))?;

        info!(brokers = %self.brokers, topic = %topic, partitions, "Kafka connected");
        Ok(partitions)
    }
}

fn to_offset(start: StartOffset) -> Offset {
    match start {
        StartOffset::Beginning => Offset::Beginning,
        StartOffset::Latest => Offset::End,
        StartOffset::At(offset) => Offset::Offset(offset),
    }
}

fn utf8(bytes: Option<&[u8]>) -> Option<String> {
    bytes
        .and_then(|b| std::str::from_utf8(b).ok())
        .map(str::to_string)
}

#[async_trait]
impl MessageLog for KafkaLog {
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<Delivery> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(value)
            .timestamp(Utc::now().timestamp_millis());

        let (partition, offset) = self
            .producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(e, _)| PipelineError::Publish(e.to_string()))?;

        debug!(topic = %topic, partition, offset, "Stored in Kafka");
        Ok(Delivery { partition, offset })
    }

    async fn consume(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<Box<dyn LogSubscription>> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| PipelineError::Consume(e.to_string()))?;

        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(topic, partition, to_offset(start))
            .map_err(|e| PipelineError::Consume(e.to_string()))?;
        consumer
            .assign(&assignment)
            .map_err(|e| PipelineError::Consume(e.to_string()))?;

        info!(topic = %topic, partition, start = ?start, "Kafka partition assigned");
        Ok(Box::new(KafkaSubscription { consumer }))
    }
}

struct KafkaSubscription {
    consumer: StreamConsumer,
}

#[async_trait]
impl LogSubscription for KafkaSubscription {
    async fn next_record(&mut self) -> Option<Result<LogRecord>> {
        let record = match self.consumer.recv().await {
            Ok(msg) => Ok(LogRecord {
                key: utf8(msg.key()),
                value: utf8(msg.payload()),
                partition: msg.partition(),
                offset: msg.offset(),
            }),
            Err(e) => Err(PipelineError::Consume(e.to_string())),
        };
        Some(record)
    }
}
