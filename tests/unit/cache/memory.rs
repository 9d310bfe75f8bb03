//! Unit tests for the in-memory price store

use dipwatch::cache::{history_key, latest_key, InMemoryStore, PriceStore, LATEST_PRICE_TTL};
use dipwatch::errors::PipelineError;
use std::time::Duration;

#[test]
fn test_key_layout() {
    assert_eq!(latest_key("BTCUSDT"), "price:BTCUSDT");
    assert_eq!(history_key("BTCUSDT"), "history:BTCUSDT");
    assert_eq!(LATEST_PRICE_TTL, Duration::from_secs(600));
}

#[tokio::test]
async fn test_unknown_symbol() {
    let store = InMemoryStore::new();
    assert_eq!(store.get_latest("DOGEUSDT").await.unwrap(), None);
    assert!(store.read_history("DOGEUSDT").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_latest_overwrites() {
    let store = InMemoryStore::new();
    store.set_latest("BTCUSDT", "100", LATEST_PRICE_TTL).await.unwrap();
    store.set_latest("BTCUSDT", "101", LATEST_PRICE_TTL).await.unwrap();
    assert_eq!(store.get_latest("BTCUSDT").await.unwrap().as_deref(), Some("101"));
}

#[tokio::test(start_paused = true)]
async fn test_latest_expires_after_ttl() {
    let store = InMemoryStore::new();
    store.set_latest("BTCUSDT", "100", LATEST_PRICE_TTL).await.unwrap();

    tokio::time::advance(Duration::from_secs(599)).await;
    assert_eq!(store.get_latest("BTCUSDT").await.unwrap().as_deref(), Some("100"));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(store.get_latest("BTCUSDT").await.unwrap(), None);
}

#[tokio::test]
async fn test_history_is_newest_first_and_trimmed() {
    let store = InMemoryStore::new();
    for price in ["1", "2", "3", "4"] {
        store.push_history("ETHUSDT", price).await.unwrap();
    }
    assert_eq!(store.push_history("ETHUSDT", "5").await.unwrap(), 5);

    store.trim_history("ETHUSDT", 3).await.unwrap();
    assert_eq!(store.read_history("ETHUSDT").await.unwrap(), vec!["5", "4", "3"]);
}

#[tokio::test]
async fn test_trim_missing_symbol_is_noop() {
    let store = InMemoryStore::new();
    store.trim_history("NOPE", 10).await.unwrap();
    assert!(store.read_history("NOPE").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_store() {
    let store = InMemoryStore::new();
    store.set_failing(true);
    assert!(matches!(
        store.push_history("BTCUSDT", "1").await,
        Err(PipelineError::CacheReadWrite(_))
    ));
    assert!(store.get_latest("BTCUSDT").await.is_err());

    store.set_failing(false);
    assert_eq!(store.push_history("BTCUSDT", "1").await.unwrap(), 1);
}
