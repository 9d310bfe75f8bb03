//! Ingestion path: feed event -> message log publish + latest-price cache write

use crate::cache::{PriceStore, LATEST_PRICE_TTL};
use crate::errors::{PipelineError, Result};
use crate::metrics::Metrics;
use crate::models::price::PriceEvent;
use crate::queue::{Delivery, Publisher};
use crate::services::binance::BinanceFeed;
use crate::services::feed::{FeedSubscription, PriceFeedHandler};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What happened to one event on each of the two write paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub delivery: Option<Delivery>,
    pub cached: bool,
}

/// Feed handler that republishes every price onto the log.
///
/// The latest-price write is independent of the publish: it is attempted
/// even when the publish gave up.
pub struct Ingestor {
    publisher: Publisher,
    store: Arc<dyn PriceStore>,
    topic: String,
    latest_ttl: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl Ingestor {
    pub fn new(publisher: Publisher, store: Arc<dyn PriceStore>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            store,
            topic: topic.into(),
            latest_ttl: LATEST_PRICE_TTL,
            metrics: None,
        }
    }

    pub fn with_latest_ttl(mut self, ttl: Duration) -> Self {
        self.latest_ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn ingest(&self, event: &PriceEvent) -> IngestReport {
        if let Some(ref metrics) = self.metrics {
            metrics.ingestor_messages_total.inc();
        }

        let delivery = match self
            .publisher
            .publish(&self.topic, &event.symbol, &event.price)
            .await
        {
            Ok(delivery) => Some(delivery),
            Err(e) => {
                warn!(symbol = %event.symbol, error = %e, "Message log push error, event dropped");
                if let Some(ref metrics) = self.metrics {
                    metrics.ingestor_publish_failures_total.inc();
                }
                None
            }
        };

        let cached = match self
            .store
            .set_latest(&event.symbol, &event.price, self.latest_ttl)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(symbol = %event.symbol, error = %e, "Latest price cache error");
                if let Some(ref metrics) = self.metrics {
                    metrics.ingestor_cache_failures_total.inc();
                }
                false
            }
        };

        IngestReport { delivery, cached }
    }
}

#[async_trait]
impl PriceFeedHandler for Ingestor {
    async fn on_price(&self, event: PriceEvent) {
        self.ingest(&event).await;
    }

    async fn on_error(&self, error: &PipelineError) {
        warn!(error = %error, "Feed error");
        if let Some(ref metrics) = self.metrics {
            metrics.ingestor_feed_errors_total.inc();
        }
    }
}

/// Owns the feed subscription for the ingestor process
pub struct IngestService {
    feed: BinanceFeed,
    handler: Arc<dyn PriceFeedHandler>,
    subscription: Option<FeedSubscription>,
}

impl IngestService {
    pub fn new(feed: BinanceFeed, handler: Arc<dyn PriceFeedHandler>) -> Self {
        Self {
            feed,
            handler,
            subscription: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let subscription = self.feed.subscribe(self.handler.clone())?;
        self.subscription = Some(subscription);
        info!(symbols = ?self.feed.symbols(), "Ingest service started");
        Ok(())
    }

    /// Send the stop request and wait for the feed to finish
    pub async fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.stop().await;
            info!("Ingest service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription
            .as_ref()
            .map(|s| !s.is_finished())
            .unwrap_or(false)
    }
}
