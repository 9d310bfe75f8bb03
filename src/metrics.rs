//! Prometheus metrics shared by the ingestor and the processor.
//!
//! Each `Metrics` owns its own registry so several instances can coexist in
//! one process (tests build one per case).

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    // Ingestion
    pub ingestor_messages_total: IntCounter,
    pub ingestor_publish_failures_total: IntCounter,
    pub ingestor_cache_failures_total: IntCounter,
    pub ingestor_feed_errors_total: IntCounter,

    // Processing
    pub processor_jobs_total: IntCounter,
    pub processor_job_errors_total: IntCounter,
    pub processor_signals_total: IntCounterVec,
    pub processor_consume_errors_total: IntCounter,
    pub processor_job_queue_depth: IntGauge,
    pub processor_workers_active: IntGauge,
    pub processor_job_duration_seconds: Histogram,

    // Backends
    pub store_connected: Gauge,
    pub log_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ingestor_messages_total = IntCounter::new(
            "ingestor_messages_total",
            "Total number of price updates received from the feed",
        )?;
        let ingestor_publish_failures_total = IntCounter::new(
            "ingestor_publish_failures_total",
            "Price updates dropped from the log path after retries ran out",
        )?;
        let ingestor_cache_failures_total = IntCounter::new(
            "ingestor_cache_failures_total",
            "Failed latest-price writes",
        )?;
        let ingestor_feed_errors_total =
            IntCounter::new("ingestor_feed_errors_total", "Feed transport errors")?;

        let processor_jobs_total =
            IntCounter::new("processor_jobs_total", "Jobs taken off the job queue")?;
        let processor_job_errors_total = IntCounter::new(
            "processor_job_errors_total",
            "Jobs whose evaluation failed",
        )?;
        let processor_signals_total = IntCounterVec::new(
            Opts::new("processor_signals_total", "Signals emitted by classification"),
            &["classification"],
        )?;
        let processor_consume_errors_total = IntCounter::new(
            "processor_consume_errors_total",
            "Message log read errors",
        )?;
        let processor_job_queue_depth =
            IntGauge::new("processor_job_queue_depth", "Jobs waiting for a worker")?;
        let processor_workers_active =
            IntGauge::new("processor_workers_active", "Workers currently running")?;
        let processor_job_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "processor_job_duration_seconds",
                "Time spent evaluating one job",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]),
        )?;

        let store_connected = Gauge::new("store_connected", "1 when the price store is reachable")?;
        let log_connected = Gauge::new("log_connected", "1 when the message log is reachable")?;

        registry.register(Box::new(ingestor_messages_total.clone()))?;
        registry.register(Box::new(ingestor_publish_failures_total.clone()))?;
        registry.register(Box::new(ingestor_cache_failures_total.clone()))?;
        registry.register(Box::new(ingestor_feed_errors_total.clone()))?;
        registry.register(Box::new(processor_jobs_total.clone()))?;
        registry.register(Box::new(processor_job_errors_total.clone()))?;
        registry.register(Box::new(processor_signals_total.clone()))?;
        registry.register(Box::new(processor_consume_errors_total.clone()))?;
        registry.register(Box::new(processor_job_queue_depth.clone()))?;
        registry.register(Box::new(processor_workers_active.clone()))?;
        registry.register(Box::new(processor_job_duration_seconds.clone()))?;
        registry.register(Box::new(store_connected.clone()))?;
        registry.register(Box::new(log_connected.clone()))?;

        Ok(Self {
            registry,
            ingestor_messages_total,
            ingestor_publish_failures_total,
            ingestor_cache_failures_total,
            ingestor_feed_errors_total,
            processor_jobs_total,
            processor_job_errors_total,
            processor_signals_total,
            processor_consume_errors_total,
            processor_job_queue_depth,
            processor_workers_active,
            processor_job_duration_seconds,
            store_connected,
            log_connected,
        })
    }

    /// Render every registered metric in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn signals(&self, classification: &str) -> u64 {
        self.processor_signals_total
            .with_label_values(&[classification])
            .get()
    }
}
