//! Loop moving records from the message log into the job queue

use crate::jobs::queue::{EnqueueError, JobSender};
use crate::jobs::types::Job;
use crate::metrics::Metrics;
use crate::queue::LogSubscription;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a failed read so a broken broker does not spin the loop
const CONSUME_ERROR_PAUSE: Duration = Duration::from_millis(500);

pub struct ConsumeLoop {
    subscription: Box<dyn LogSubscription>,
    metrics: Option<Arc<Metrics>>,
}

impl ConsumeLoop {
    pub fn new(subscription: Box<dyn LogSubscription>) -> Self {
        Self {
            subscription,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run until `cancel` fires or the subscription ends.
    ///
    /// The sender is handed back so the caller decides when the queue closes.
    pub async fn run(mut self, jobs: JobSender, cancel: CancellationToken) -> JobSender {
        info!("ConsumeLoop: started");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.subscription.next_record() => next,
            };

            let record = match next {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    warn!(error = %e, "ConsumeLoop: read failed");
                    if let Some(ref metrics) = self.metrics {
                        metrics.processor_consume_errors_total.inc();
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(CONSUME_ERROR_PAUSE) => continue,
                    }
                }
                None => {
                    warn!("ConsumeLoop: subscription ended");
                    break;
                }
            };

            let Some(job) = Job::from_record(&record) else {
                warn!(
                    partition = record.partition,
                    offset = record.offset,
                    "ConsumeLoop: skipping record without symbol key or price value"
                );
                continue;
            };

            debug!(symbol = %job.symbol, offset = record.offset, "ConsumeLoop: enqueuing job");
            match jobs.enqueue(job, &cancel).await {
                Ok(()) => {
                    if let Some(ref metrics) = self.metrics {
                        metrics.processor_job_queue_depth.set(jobs.len() as i64);
                    }
                }
                Err(EnqueueError::Cancelled(job)) => {
                    debug!(symbol = %job.symbol, "ConsumeLoop: cancelled while queue full");
                    break;
                }
                Err(EnqueueError::Closed(job)) => {
                    warn!(symbol = %job.symbol, "ConsumeLoop: job queue closed");
                    break;
                }
            }
        }

        info!("ConsumeLoop: stopped");
        jobs
    }
}
