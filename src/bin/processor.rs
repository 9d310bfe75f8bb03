//! dipwatch Processor
//!
//! Consumes prices from the message log and runs the dip-detection worker pool.
//! Reads and writes the shared price window in Redis; can run alongside any
//! number of ingestors.

use dipwatch::cache::{PriceStore, RedisCache};
use dipwatch::config::{self, ProcessorConfig};
use dipwatch::core::http::{start_server, AppState};
use dipwatch::core::lifecycle::{shutdown_signal, Processor};
use dipwatch::logging;
use dipwatch::metrics::Metrics;
use dipwatch::queue::{KafkaLog, MessageLog};
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

    let config = ProcessorConfig::from_env();
    let env = config::get_environment();
    info!("Starting dipwatch Processor");
    info!(environment = %env, "Environment");
    info!(
        workers = config.workers,
        window = config.window_size,
        "Worker concurrency: {}",
        config.workers
    );

    let metrics = Arc::new(Metrics::new()?);

    info!("Initializing Redis connection...");
    let cache: Arc<dyn PriceStore> = match RedisCache::new().await {
        Ok(c) => {
            metrics.store_connected.set(1.0);
            Arc::new(c)
        }
        Err(e) => {
            error!(error = %e, "Processor Redis init failed - exiting");
            return Err(e.into());
        }
    };

    info!("Initializing Kafka consumer...");
    let kafka = KafkaLog::new()?;
    if let Err(e) = kafka.verify(&config.topic).await {
        error!(error = %e, "Processor Kafka init failed - exiting");
        return Err(e.into());
    }
    metrics.log_connected.set(1.0);
    let log: Arc<dyn MessageLog> = Arc::new(kafka);

    let processor = Processor::builder(config, cache, log)
        .metrics(metrics.clone())
        .start()
        .await?;

    let server_shutdown = CancellationToken::new();
    let port = config::get_metrics_port(2113);
    let state = AppState::new("dipwatch-processor", metrics.clone())
        .with_lifecycle(processor.subscribe_state());
    let server = tokio::spawn(start_server(port, state, server_shutdown.clone()));

    info!("Processor started, waiting for shutdown signal...");
    shutdown_signal().await;

    info!("Shutting down processor...");
    let result = processor.shutdown().await;

    server_shutdown.cancel();
    match server.await {
        Ok(Err(e)) => error!(error = %e, "Metrics server error"),
        Err(e) => error!(error = %e, "Metrics server task failed"),
        Ok(Ok(())) => {}
    }

    match result {
        Ok(()) => {
            info!("Processor shut down clean.");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Processor shutdown incomplete");
            Err(e.into())
        }
    }
}
