//! Unit tests for the sliding-window dip strategy

use dipwatch::cache::{InMemoryStore, PriceStore};
use dipwatch::errors::PipelineError;
use dipwatch::jobs::Job;
use dipwatch::models::{Classification, Evaluation};
use dipwatch::strategies::{
    classify, moving_average, parse_price, SlidingWindowStrategy, StrategyConfig,
};
use std::sync::Arc;

fn prices(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn strategy() -> (Arc<InMemoryStore>, SlidingWindowStrategy) {
    let store = Arc::new(InMemoryStore::new());
    let strategy = SlidingWindowStrategy::new(store.clone());
    (store, strategy)
}

async fn feed(strategy: &SlidingWindowStrategy, symbol: &str, values: &[&str]) -> Vec<Evaluation> {
    let mut out = Vec::new();
    for value in values {
        out.push(strategy.evaluate(&Job::new(symbol, *value)).await.unwrap());
    }
    out
}

#[test]
fn test_dip_when_last_price_drops_ten_percent() {
    // Newest first, as stored.
    let window = prices(&["90", "100", "100", "100", "100", "100", "100", "100", "100", "100"]);
    let signal = classify("BTCUSDT", "90", &window, 0.01).unwrap();
    assert_eq!(signal.moving_average, 99.0);
    assert_eq!(signal.current_price, 90.0);
    assert_eq!(signal.classification, Classification::Dip);
}

#[test]
fn test_stable_when_flat() {
    let window = prices(&["100"; 10]);
    let signal = classify("BTCUSDT", "100", &window, 0.01).unwrap();
    assert_eq!(signal.moving_average, 100.0);
    assert_eq!(signal.classification, Classification::Stable);
}

#[test]
fn test_threshold_is_strict() {
    // avg 100, threshold 99.0: exactly 99 is not a dip.
    let window = prices(&["100"; 10]);
    let signal = classify("ETHUSDT", "99", &window, 0.01).unwrap();
    assert_eq!(signal.classification, Classification::Stable);

    let signal = classify("ETHUSDT", "98.99", &window, 0.01).unwrap();
    assert_eq!(signal.classification, Classification::Dip);
}

#[test]
fn test_moving_average_is_arithmetic_mean() {
    let window = prices(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);
    assert_eq!(moving_average(&window).unwrap(), 5.5);
}

#[test]
fn test_parse_price_rejects_garbage() {
    assert_eq!(parse_price(" 42.5 ").unwrap(), 42.5);
    assert!(matches!(parse_price("abc"), Err(PipelineError::Parse { .. })));
    assert!(matches!(parse_price(""), Err(PipelineError::Parse { .. })));
    assert!(matches!(parse_price("NaN"), Err(PipelineError::Parse { .. })));
    assert!(matches!(parse_price("inf"), Err(PipelineError::Parse { .. })));
}

#[test]
fn test_config_validation() {
    assert!(StrategyConfig::default().validate().is_ok());
    let zero = StrategyConfig {
        window_size: 0,
        ..StrategyConfig::default()
    };
    assert!(matches!(zero.validate(), Err(PipelineError::Config(_))));
    let bad_threshold = StrategyConfig {
        dip_threshold: 1.5,
        ..StrategyConfig::default()
    };
    assert!(bad_threshold.validate().is_err());
}

#[tokio::test]
async fn test_collecting_until_window_full() {
    let (_, strategy) = strategy();
    let outcomes = feed(&strategy, "BTCUSDT", &["100"; 9]).await;

    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(
            outcome,
            &Evaluation::Collecting {
                symbol: "BTCUSDT".to_string(),
                len: i + 1,
                capacity: 10,
            }
        );
    }
}

#[tokio::test]
async fn test_tenth_price_produces_signal() {
    let (store, strategy) = strategy();
    let outcomes = feed(
        &strategy,
        "BTCUSDT",
        &["100", "100", "100", "100", "100", "100", "100", "100", "100", "90"],
    )
    .await;

    let signal = outcomes.last().and_then(Evaluation::signal).expect("signal on 10th price");
    assert_eq!(signal.moving_average, 99.0);
    assert!(signal.is_dip());

    let history = store.read_history("BTCUSDT").await.unwrap();
    assert_eq!(history.first().map(String::as_str), Some("90"));
}

#[tokio::test]
async fn test_all_equal_prices_are_stable() {
    let (_, strategy) = strategy();
    let outcomes = feed(&strategy, "ETHUSDT", &["100"; 10]).await;
    let signal = outcomes.last().and_then(Evaluation::signal).unwrap();
    assert_eq!(signal.classification, Classification::Stable);
}

#[tokio::test]
async fn test_window_stays_capped() {
    let (store, strategy) = strategy();
    for i in 0..50 {
        strategy
            .evaluate(&Job::new("SOLUSDT", format!("{}", 100 + i)))
            .await
            .unwrap();
        assert!(store.read_history("SOLUSDT").await.unwrap().len() <= 10);
    }
    let history = store.read_history("SOLUSDT").await.unwrap();
    assert_eq!(history.len(), 10);
    assert_eq!(history[0], "149");
    assert_eq!(history[9], "140");
}

#[tokio::test]
async fn test_duplicate_job_only_appends_itself() {
    let (store, strategy) = strategy();
    feed(&strategy, "BTCUSDT", &["100"; 8]).await;

    let duplicate = Job::new("BTCUSDT", "95");
    strategy.evaluate(&duplicate).await.unwrap();
    let outcome = strategy.evaluate(&duplicate).await.unwrap();

    let history = store.read_history("BTCUSDT").await.unwrap();
    assert_eq!(history.len(), 10);
    assert_eq!(&history[..2], &["95".to_string(), "95".to_string()]);
    // (8 * 100 + 2 * 95) / 10
    assert_eq!(outcome.signal().unwrap().moving_average, 99.0);
}

#[tokio::test]
async fn test_malformed_price_skips_only_that_job() {
    let (store, strategy) = strategy();
    feed(&strategy, "BTCUSDT", &["100"; 10]).await;

    let err = strategy.evaluate(&Job::new("BTCUSDT", "not-a-price")).await;
    assert!(matches!(err, Err(PipelineError::Parse { .. })));
    assert!(!store
        .read_history("BTCUSDT")
        .await
        .unwrap()
        .contains(&"not-a-price".to_string()));

    let outcome = strategy.evaluate(&Job::new("BTCUSDT", "100")).await.unwrap();
    assert_eq!(outcome.signal().unwrap().classification, Classification::Stable);
}

#[tokio::test]
async fn test_malformed_price_while_collecting() {
    let (store, strategy) = strategy();
    let err = strategy.evaluate(&Job::new("BTCUSDT", "???")).await;
    assert!(matches!(err, Err(PipelineError::Parse { .. })));
    assert!(store.read_history("BTCUSDT").await.unwrap().is_empty());

    let outcome = strategy.evaluate(&Job::new("BTCUSDT", "1")).await.unwrap();
    assert!(matches!(outcome, Evaluation::Collecting { len: 1, .. }));
}

#[tokio::test]
async fn test_store_failure_is_cache_error() {
    let (store, strategy) = strategy();
    store.set_failing(true);
    let err = strategy.evaluate(&Job::new("BTCUSDT", "100")).await;
    assert!(matches!(err, Err(PipelineError::CacheReadWrite(_))));
}

#[tokio::test]
async fn test_uses_newest_entries_when_window_over_capacity() {
    let (store, strategy) = strategy();
    // Simulate another worker's push that has not been trimmed yet.
    for _ in 0..10 {
        store.push_history("BTCUSDT", "100").await.unwrap();
    }
    store.push_history("BTCUSDT", "1000").await.unwrap();

    let outcome = strategy.evaluate(&Job::new("BTCUSDT", "100")).await.unwrap();
    let signal = outcome.signal().unwrap();
    // Window is [100, 1000, 100 x 8] after our push and trim.
    assert_eq!(signal.moving_average, 190.0);
}

#[tokio::test]
async fn test_custom_window_size() {
    let store = Arc::new(InMemoryStore::new());
    let strategy = SlidingWindowStrategy::with_config(
        store,
        StrategyConfig {
            window_size: 3,
            dip_threshold: 0.05,
        },
    )
    .unwrap();

    let outcomes = feed(&strategy, "BTCUSDT", &["100", "100", "100", "90"]).await;
    assert!(matches!(outcomes[1], Evaluation::Collecting { len: 2, capacity: 3, .. }));
    let signal = outcomes[3].signal().unwrap();
    // avg of [90, 100, 100] = 96.67, threshold 91.83
    assert!(signal.is_dip());
}
