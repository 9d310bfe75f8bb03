//! Worker pool draining the job queue

use crate::jobs::context::JobContext;
use crate::jobs::handlers;
use crate::jobs::queue::JobReceiver;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_WORKERS: usize = 5;

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Exact number of workers spawned
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Fixed set of workers sharing one job queue.
///
/// Workers have no affinity to symbols, so two of them may process jobs for
/// the same symbol at once. The strategy tolerates that.
pub struct WorkerPool {
    config: PoolConfig,
    context: Arc<JobContext>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, context: Arc<JobContext>) -> Self {
        Self {
            config,
            context,
            workers: JoinSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.config.workers
    }

    /// Spawn the workers.
    ///
    /// Each worker exits when the queue is closed and empty, or when `halt`
    /// fires. A job already being processed always runs to completion.
    pub fn start(&mut self, jobs: JobReceiver, halt: CancellationToken) {
        if self.config.workers == 0 {
            warn!("WorkerPool: started with zero workers, jobs will not be processed");
        }

        for id in 0..self.config.workers {
            let jobs = jobs.clone();
            let context = self.context.clone();
            let halt = halt.clone();
            self.workers.spawn(run_worker(id, jobs, context, halt));
        }

        info!(
            workers = self.config.workers,
            "WorkerPool: started {} workers", self.config.workers
        );
    }

    /// Number of workers that have not exited yet
    pub fn running(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to exit. Cancel-safe.
    pub async fn wait(&mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "WorkerPool: worker task failed");
            }
        }
    }

    /// Abort whatever is still running
    pub fn abort(&mut self) {
        self.workers.abort_all();
    }
}

async fn run_worker(id: usize, jobs: JobReceiver, ctx: Arc<JobContext>, halt: CancellationToken) {
    debug!(worker = id, "Worker {} started and waiting for jobs...", id);
    if let Some(ref metrics) = ctx.metrics {
        metrics.processor_workers_active.inc();
    }

    while let Some(job) = jobs.dequeue(&halt).await {
        if let Some(ref metrics) = ctx.metrics {
            metrics.processor_job_queue_depth.set(jobs.len() as i64);
        }

        let symbol = job.symbol.clone();
        if let Err(e) = handlers::handle_price_job(id, job, &ctx).await {
            warn!(
                worker = id,
                symbol = %symbol,
                error = %e,
                "[Worker {}] {}: job skipped",
                id,
                symbol
            );
        }
    }

    if let Some(ref metrics) = ctx.metrics {
        metrics.processor_workers_active.dec();
    }
    debug!(worker = id, "Worker {} stopped", id);
}
