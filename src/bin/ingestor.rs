//! dipwatch Ingestor
//!
//! Maintains the exchange feed connection, republishes every price onto the
//! message log and caches the latest price per symbol.
//! This service should run as a singleton (one instance).

use dipwatch::cache::{PriceStore, RedisCache};
use dipwatch::config::{self, IngestorConfig};
use dipwatch::core::http::{start_server, AppState};
use dipwatch::core::lifecycle::shutdown_signal;
use dipwatch::logging;
use dipwatch::metrics::Metrics;
use dipwatch::queue::{KafkaLog, MessageLog, Publisher};
use dipwatch::services::{BinanceFeed, IngestService, Ingestor};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    // Initialize logging based on environment
    logging::init_logging();

    let config = IngestorConfig::from_env();
    let env = config::get_environment();
    info!("Starting dipwatch Ingestor");
    info!(environment = %env, "Environment");
    info!(symbols = ?config.symbols, topic = %config.topic, "Ingest targets");

    let metrics = Arc::new(Metrics::new()?);

    // Startup failures are fatal: no partial start.
    info!("Initializing Redis connection...");
    let cache: Arc<dyn PriceStore> = match RedisCache::new().await {
        Ok(c) => {
            metrics.store_connected.set(1.0);
            Arc::new(c)
        }
        Err(e) => {
            error!(error = %e, "Ingestor requires Redis - exiting");
            return Err(e.into());
        }
    };

    info!("Initializing Kafka producer...");
    let kafka = KafkaLog::new()?;
    if let Err(e) = kafka.verify(&config.topic).await {
        error!(error = %e, "Ingestor requires Kafka - exiting");
        return Err(e.into());
    }
    metrics.log_connected.set(1.0);
    let log: Arc<dyn MessageLog> = Arc::new(kafka);

    let ingestor = Ingestor::new(Publisher::new(log), cache, config.topic.clone())
        .with_latest_ttl(config.latest_price_ttl)
        .with_metrics(metrics.clone());

    let feed = BinanceFeed::with_base_url(&config.feed_url, config.symbols.clone());
    let mut service = IngestService::new(feed, Arc::new(ingestor));
    service.start()?;

    let server_shutdown = CancellationToken::new();
    let port = config::get_metrics_port(2112);
    let server = tokio::spawn(start_server(
        port,
        AppState::new("dipwatch-ingestor", metrics.clone()),
        server_shutdown.clone(),
    ));

    info!("Ingestor is LIVE. Streaming data to Kafka & Redis...");
    shutdown_signal().await;

    info!("Shutting down ingestor...");
    service.stop().await;
    server_shutdown.cancel();
    match server.await {
        Ok(Err(e)) => error!(error = %e, "Metrics server error"),
        Err(e) => error!(error = %e, "Metrics server task failed"),
        Ok(Ok(())) => {}
    }
    info!("Ingestor stopped");

    Ok(())
}
