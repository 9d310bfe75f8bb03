//! Per-job processing run by each worker

use crate::errors::Result;
use crate::jobs::context::JobContext;
use crate::jobs::types::Job;
use crate::models::signal::{Classification, Evaluation};
use std::time::Instant;
use tracing::{info, warn};

/// Run the strategy for one job and report the outcome.
///
/// Errors are returned to the worker loop, which logs them and moves on.
pub async fn handle_price_job(worker_id: usize, job: Job, ctx: &JobContext) -> Result<Evaluation> {
    let start = Instant::now();
    if let Some(ref metrics) = ctx.metrics {
        metrics.processor_jobs_total.inc();
    }

    let result = ctx.strategy.evaluate(&job).await;

    if let Some(ref metrics) = ctx.metrics {
        metrics
            .processor_job_duration_seconds
            .observe(start.elapsed().as_secs_f64());
    }

    let evaluation = match result {
        Ok(evaluation) => evaluation,
        Err(e) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics.processor_job_errors_total.inc();
            }
            return Err(e);
        }
    };

    match &evaluation {
        Evaluation::Collecting { symbol, len, capacity } => {
            info!(
                worker = worker_id,
                symbol = %symbol,
                len,
                capacity,
                "[Worker {}] {}: Collecting data... ({}/{})",
                worker_id,
                symbol,
                len,
                capacity
            );
        }
        Evaluation::Signal(signal) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics
                    .processor_signals_total
                    .with_label_values(&[signal.classification.as_str()])
                    .inc();
            }
            match signal.classification {
                Classification::Dip => info!(
                    worker = worker_id,
                    symbol = %signal.symbol,
                    price = signal.current_price,
                    avg = signal.moving_average,
                    classification = %signal.classification,
                    "ALERT [Worker {}]: {} is DIPPING! Price: {:.4} | Avg: {:.4}",
                    worker_id,
                    signal.symbol,
                    signal.current_price,
                    signal.moving_average
                ),
                Classification::Stable => info!(
                    worker = worker_id,
                    symbol = %signal.symbol,
                    price = signal.current_price,
                    avg = signal.moving_average,
                    classification = %signal.classification,
                    "stable [Worker {}]: {} at {:.4} (Avg: {:.4})",
                    worker_id,
                    signal.symbol,
                    signal.current_price,
                    signal.moving_average
                ),
            }
        }
    }

    if let Some(ref outcomes) = ctx.outcomes {
        if outcomes.send(evaluation.clone()).is_err() {
            warn!(worker = worker_id, "Outcome receiver dropped");
        }
    }

    Ok(evaluation)
}
