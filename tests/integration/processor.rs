//! Processor lifecycle: consume, evaluate, drain and stop

use std::sync::Arc;
use std::time::Duration;

use dipwatch::cache::{InMemoryStore, PriceStore};
use dipwatch::config::ProcessorConfig;
use dipwatch::core::{LifecycleState, Processor};
use dipwatch::errors::PipelineError;
use dipwatch::metrics::Metrics;
use dipwatch::models::{Classification, Evaluation};
use dipwatch::queue::{InMemoryLog, MessageLog, Publisher, StartOffset};
use dipwatch::services::Ingestor;
use tokio::sync::mpsc;

use crate::test_utils::{wait_until, within, GatedStore};

const TOPIC: &str = "market_data";

fn config(workers: usize) -> ProcessorConfig {
    ProcessorConfig {
        topic: TOPIC.to_string(),
        workers,
        ..ProcessorConfig::default()
    }
}

async fn publish_all(log: &InMemoryLog, symbol: &str, prices: &[&str]) {
    for price in prices {
        log.publish(TOPIC, symbol, price).await.unwrap();
    }
}

#[tokio::test]
async fn processor_detects_dip_end_to_end() {
    let store = Arc::new(InMemoryStore::new());
    let log = Arc::new(InMemoryLog::default());
    let metrics = Arc::new(Metrics::new().unwrap());
    let (tx, mut outcomes) = mpsc::unbounded_channel();

    let processor = Processor::builder(config(1), store.clone(), log.clone())
        .metrics(metrics.clone())
        .outcomes(tx)
        .start()
        .await
        .unwrap();
    assert_eq!(processor.state(), LifecycleState::Running);
    assert_eq!(processor.workers(), 1);

    let mut prices = vec!["100"; 9];
    prices.push("90");
    publish_all(&log, "BTCUSDT", &prices).await;

    let mut seen = Vec::new();
    for _ in 0..10 {
        seen.push(within(Duration::from_secs(2), outcomes.recv()).await.unwrap());
    }
    assert!(seen[..9]
        .iter()
        .all(|e| matches!(e, Evaluation::Collecting { .. })));
    let signal = seen[9].signal().unwrap();
    assert_eq!(signal.classification, Classification::Dip);
    assert_eq!(signal.moving_average, 99.0);
    assert_eq!(signal.current_price, 90.0);

    processor.shutdown().await.unwrap();
    assert_eq!(metrics.processor_jobs_total.get(), 10);
    assert_eq!(store.read_history("BTCUSDT").await.unwrap().len(), 10);
}

#[tokio::test]
async fn processor_reads_from_beginning_when_asked() {
    let store = Arc::new(InMemoryStore::new());
    let log = Arc::new(InMemoryLog::default());
    publish_all(&log, "ETHUSDT", &["1", "2", "3"]).await;

    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let processor = Processor::builder(config(1), store, log)
        .start_offset(StartOffset::Beginning)
        .outcomes(tx)
        .start()
        .await
        .unwrap();

    for expected in 1..=3 {
        let outcome = within(Duration::from_secs(2), outcomes.recv()).await.unwrap();
        assert!(matches!(outcome, Evaluation::Collecting { len, .. } if len == expected));
    }
    processor.shutdown().await.unwrap();
}

#[tokio::test]
async fn processor_starts_at_latest_by_default() {
    let store = Arc::new(InMemoryStore::new());
    let log = Arc::new(InMemoryLog::default());
    publish_all(&log, "ETHUSDT", &["1", "2", "3"]).await;

    let metrics = Arc::new(Metrics::new().unwrap());
    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let processor = Processor::builder(config(2), store.clone(), log.clone())
        .metrics(metrics.clone())
        .outcomes(tx)
        .start()
        .await
        .unwrap();

    publish_all(&log, "ETHUSDT", &["4"]).await;
    within(Duration::from_secs(2), outcomes.recv()).await.unwrap();
    processor.shutdown().await.unwrap();

    assert_eq!(metrics.processor_jobs_total.get(), 1);
    assert_eq!(store.read_history("ETHUSDT").await.unwrap(), vec!["4"]);
}

#[tokio::test]
async fn shutdown_drains_queued_jobs() {
    let store = Arc::new(GatedStore::new());
    let log = Arc::new(InMemoryLog::default());
    let metrics = Arc::new(Metrics::new().unwrap());

    let processor = Processor::builder(config(1), store.clone(), log.clone())
        .metrics(metrics.clone())
        .start()
        .await
        .unwrap();
    let mut state = processor.subscribe_state();

    publish_all(&log, "BTCUSDT", &["1", "2", "3", "4", "5"]).await;

    // One job held by the worker, four waiting in the queue
    assert!(wait_until(Duration::from_secs(2), || store.waiting() == 1).await);
    assert!(wait_until(Duration::from_secs(2), || metrics.processor_job_queue_depth.get() == 4).await);

    let shutdown = tokio::spawn(processor.shutdown());
    within(
        Duration::from_secs(2),
        state.wait_for(|s| *s == LifecycleState::Draining),
    )
    .await
    .unwrap();

    // Published after the consume loop stopped, must not be picked up
    publish_all(&log, "BTCUSDT", &["6"]).await;

    store.open(10);
    within(Duration::from_secs(5), shutdown).await.unwrap().unwrap();

    assert_eq!(metrics.processor_jobs_total.get(), 5);
    assert_eq!(metrics.processor_job_errors_total.get(), 0);
    assert_eq!(
        store.read_history("BTCUSDT").await.unwrap(),
        vec!["5", "4", "3", "2", "1"]
    );
    assert_eq!(*state.borrow(), LifecycleState::Stopped);
}

#[tokio::test]
async fn shutdown_times_out_when_workers_hang() {
    let store = Arc::new(GatedStore::new());
    let log = Arc::new(InMemoryLog::default());
    let metrics = Arc::new(Metrics::new().unwrap());

    let processor = Processor::builder(
        ProcessorConfig {
            drain_timeout: Duration::from_millis(100),
            ..config(1)
        },
        store.clone(),
        log.clone(),
    )
    .metrics(metrics.clone())
    .start()
    .await
    .unwrap();
    let state = processor.subscribe_state();

    publish_all(&log, "BTCUSDT", &["1", "2"]).await;
    assert!(wait_until(Duration::from_secs(2), || store.waiting() == 1).await);

    let result = within(Duration::from_secs(5), processor.shutdown()).await;
    assert!(matches!(result, Err(PipelineError::ShutdownTimeout(d)) if d == Duration::from_millis(100)));
    assert_eq!(*state.borrow(), LifecycleState::Stopped);
    assert_eq!(metrics.processor_jobs_total.get(), 1);
}

#[tokio::test]
async fn immediate_shutdown_is_clean() {
    let processor = Processor::builder(
        config(5),
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryLog::default()),
    )
    .start()
    .await
    .unwrap();
    let state = processor.subscribe_state();
    assert_eq!(*state.borrow(), LifecycleState::Running);

    within(Duration::from_secs(2), processor.shutdown())
        .await
        .unwrap();
    assert_eq!(*state.borrow(), LifecycleState::Stopped);
}

#[tokio::test]
async fn unusable_records_are_skipped_and_bad_prices_counted() {
    let store = Arc::new(InMemoryStore::new());
    let log = Arc::new(InMemoryLog::default());
    let metrics = Arc::new(Metrics::new().unwrap());
    let (tx, mut outcomes) = mpsc::unbounded_channel();

    let processor = Processor::builder(
        ProcessorConfig {
            window_size: 1,
            ..config(1)
        },
        store,
        log.clone(),
    )
    .metrics(metrics.clone())
    .outcomes(tx)
    .start()
    .await
    .unwrap();

    log.publish(TOPIC, "", "100").await.unwrap();
    log.publish(TOPIC, "BTCUSDT", "abc").await.unwrap();
    log.publish(TOPIC, "BTCUSDT", "100").await.unwrap();

    let outcome = within(Duration::from_secs(2), outcomes.recv()).await.unwrap();
    assert_eq!(outcome.signal().unwrap().classification, Classification::Stable);
    assert_eq!(metrics.processor_job_errors_total.get(), 1);
    // Keyless record never became a job
    assert_eq!(metrics.processor_jobs_total.get(), 2);

    processor.shutdown().await.unwrap();
}

#[tokio::test]
async fn startup_failures_are_reported() {
    let log = Arc::new(InMemoryLog::new(1));

    let bad_partition = Processor::builder(
        ProcessorConfig {
            partition: 3,
            ..config(1)
        },
        Arc::new(InMemoryStore::new()),
        log.clone(),
    )
    .start()
    .await;
    match bad_partition {
        Err(e) => {
            assert!(matches!(e, PipelineError::ConnectInit { .. }));
            assert!(e.is_fatal());
        }
        Ok(_) => panic!("expected startup to fail"),
    }

    let no_workers = Processor::builder(config(0), Arc::new(InMemoryStore::new()), log.clone())
        .start()
        .await;
    assert!(matches!(no_workers, Err(PipelineError::Config(_))));

    let bad_window = Processor::builder(
        ProcessorConfig {
            window_size: 0,
            ..config(1)
        },
        Arc::new(InMemoryStore::new()),
        log,
    )
    .start()
    .await;
    assert!(matches!(bad_window, Err(PipelineError::Config(_))));
}

#[tokio::test]
async fn ingestor_to_processor_pipeline() {
    let store = Arc::new(InMemoryStore::new());
    let log = Arc::new(InMemoryLog::new(3));
    let metrics = Arc::new(Metrics::new().unwrap());

    let partition = dipwatch::queue::memory::partition_for("SOLUSDT", 3);
    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let processor = Processor::builder(
        ProcessorConfig {
            partition,
            ..config(1)
        },
        store.clone(),
        log.clone(),
    )
    .metrics(metrics.clone())
    .outcomes(tx)
    .start()
    .await
    .unwrap();

    let ingestor = Ingestor::new(Publisher::new(log.clone()), store.clone(), TOPIC)
        .with_metrics(metrics.clone());
    for price in ["150"; 9].into_iter().chain(["140"]) {
        let report = ingestor
            .ingest(&dipwatch::models::PriceEvent::new("SOLUSDT", price))
            .await;
        assert_eq!(report.delivery.map(|d| d.partition), Some(partition));
        assert!(report.cached);
    }

    let mut last = None;
    for _ in 0..10 {
        last = within(Duration::from_secs(2), outcomes.recv()).await;
    }
    let signal = last.as_ref().and_then(Evaluation::signal).unwrap();
    assert!(signal.is_dip());
    assert_eq!(signal.moving_average, 149.0);
    assert_eq!(store.get_latest("SOLUSDT").await.unwrap().as_deref(), Some("140"));
    assert_eq!(metrics.ingestor_messages_total.get(), 10);

    processor.shutdown().await.unwrap();
}
