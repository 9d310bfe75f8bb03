//! Processor lifecycle: Starting -> Running -> Draining -> Stopped
//!
//! Shutdown order is fixed: stop the consume loop, close the job queue, let
//! the workers drain it. Workers are only hard-stopped if draining outlives
//! the configured timeout.

use crate::cache::PriceStore;
use crate::config::ProcessorConfig;
use crate::core::consumer::ConsumeLoop;
use crate::core::runtime::{PoolConfig, WorkerPool};
use crate::errors::{PipelineError, Result};
use crate::jobs::context::JobContext;
use crate::jobs::queue::{JobQueue, JobSender};
use crate::metrics::Metrics;
use crate::models::signal::Evaluation;
use crate::queue::{MessageLog, StartOffset};
use crate::strategies::{SlidingWindowStrategy, StrategyConfig};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Time given to workers to finish their current job after a hard stop
const HALT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub struct ProcessorBuilder {
    config: ProcessorConfig,
    store: Arc<dyn PriceStore>,
    log: Arc<dyn MessageLog>,
    start_offset: StartOffset,
    metrics: Option<Arc<Metrics>>,
    outcomes: Option<mpsc::UnboundedSender<Evaluation>>,
}

impl ProcessorBuilder {
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Receive every evaluation produced by the workers
    pub fn outcomes(mut self, outcomes: mpsc::UnboundedSender<Evaluation>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }

    /// Where to start reading the partition. Defaults to the newest offset.
    pub fn start_offset(mut self, start: StartOffset) -> Self {
        self.start_offset = start;
        self
    }

    /// Subscribe to the log and spawn the consume loop and worker pool.
    ///
    /// Any failure here is a startup failure; nothing is left running.
    pub async fn start(self) -> Result<Processor> {
        let (state, _) = watch::channel(LifecycleState::Starting);
        let config = self.config;
        info!(
            topic = %config.topic,
            partition = config.partition,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Processor: starting"
        );

        let strategy = SlidingWindowStrategy::with_config(
            self.store,
            StrategyConfig {
                window_size: config.window_size,
                dip_threshold: config.dip_threshold,
            },
        )?;
        if config.workers == 0 {
            return Err(PipelineError::Config("worker count must be at least 1".into()));
        }

        let subscription = self
            .log
            .consume(&config.topic, config.partition, self.start_offset)
            .await
            .map_err(|e| PipelineError::connect_init("message log", e))?;

        let mut context = JobContext::new(Arc::new(strategy), self.metrics.clone());
        if let Some(outcomes) = self.outcomes {
            context = context.with_outcomes(outcomes);
        }

        let (sender, receiver) = JobQueue::bounded(config.queue_capacity);
        let ingest = CancellationToken::new();
        let halt = CancellationToken::new();

        let mut pool = WorkerPool::new(
            PoolConfig {
                workers: config.workers,
            },
            Arc::new(context),
        );
        pool.start(receiver, halt.clone());

        let mut consume_loop = ConsumeLoop::new(subscription);
        if let Some(metrics) = self.metrics {
            consume_loop = consume_loop.with_metrics(metrics);
        }
        let consumer = tokio::spawn(consume_loop.run(sender, ingest.clone()));

        state.send_replace(LifecycleState::Running);
        info!("Processor: running");

        Ok(Processor {
            state,
            ingest,
            halt,
            consumer,
            pool,
            drain_timeout: config.drain_timeout,
        })
    }
}

pub struct Processor {
    state: watch::Sender<LifecycleState>,
    ingest: CancellationToken,
    halt: CancellationToken,
    consumer: JoinHandle<JobSender>,
    pool: WorkerPool,
    drain_timeout: Duration,
}

impl Processor {
    pub fn builder(
        config: ProcessorConfig,
        store: Arc<dyn PriceStore>,
        log: Arc<dyn MessageLog>,
    ) -> ProcessorBuilder {
        ProcessorBuilder {
            config,
            store,
            log,
            start_offset: StartOffset::Latest,
            metrics: None,
            outcomes: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Drain and stop.
    ///
    /// Every job already in the queue is processed unless the drain timeout
    /// elapses first, in which case workers are stopped after their current
    /// job and `ShutdownTimeout` is returned.
    pub async fn shutdown(mut self) -> Result<()> {
        self.state.send_replace(LifecycleState::Draining);
        info!("Processor: draining");

        self.ingest.cancel();
        match (&mut self.consumer).await {
            Ok(sender) => {
                info!(queued = sender.len(), "Processor: closing job queue");
                sender.close_and_drain();
            }
            // The sender died with the task, which closes the queue as well.
            Err(e) => error!(error = %e, "Processor: consume loop task failed"),
        }

        let result = match tokio::time::timeout(self.drain_timeout, self.pool.wait()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(
                    timeout = ?self.drain_timeout,
                    running = self.pool.running(),
                    "Processor: drain timed out, stopping workers"
                );
                self.halt.cancel();
                if tokio::time::timeout(HALT_GRACE, self.pool.wait()).await.is_err() {
                    self.pool.abort();
                }
                Err(PipelineError::ShutdownTimeout(self.drain_timeout))
            }
        };

        self.state.send_replace(LifecycleState::Stopped);
        info!("Processor: stopped");
        result
    }
}

/// Resolve on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
