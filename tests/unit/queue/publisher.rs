//! Unit tests for publish retry behavior

use dipwatch::errors::PipelineError;
use dipwatch::queue::{InMemoryLog, Publisher, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, 5);
    assert_eq!(policy.backoff, Duration::from_millis(100));
    assert_eq!(policy.total_backoff(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_retries_until_success() {
    let log = Arc::new(InMemoryLog::default());
    log.fail_next_publishes(3);
    let publisher = Publisher::new(log.clone());

    let delivery = publisher.publish("market_data", "BTCUSDT", "100").await.unwrap();
    assert_eq!(delivery.offset, 0);
    assert_eq!(log.publish_attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_retries() {
    let log = Arc::new(InMemoryLog::default());
    log.fail_next_publishes(100);
    let publisher = Publisher::new(log.clone());

    let result = publisher.publish("market_data", "BTCUSDT", "100").await;
    assert!(matches!(result, Err(PipelineError::Publish(_))));
    // First attempt plus five retries
    assert_eq!(log.publish_attempts(), 6);
    assert!(log.records("market_data", 0).await.is_empty());
}

#[tokio::test]
async fn test_no_retry_policy() {
    let log = Arc::new(InMemoryLog::default());
    log.fail_next_publishes(1);
    let publisher = Publisher::with_policy(
        log.clone(),
        RetryPolicy {
            max_retries: 0,
            backoff: Duration::ZERO,
        },
    );

    assert!(publisher.publish("t", "k", "v").await.is_err());
    assert_eq!(log.publish_attempts(), 1);
}
