//! Job context for dependency injection

use crate::metrics::Metrics;
use crate::models::signal::Evaluation;
use crate::strategies::SlidingWindowStrategy;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a worker needs to process a job, shared by all workers.
///
/// `outcomes` is an optional tap on every successful evaluation; the signal
/// itself is always logged regardless.
pub struct JobContext {
    pub strategy: Arc<SlidingWindowStrategy>,
    pub metrics: Option<Arc<Metrics>>,
    pub outcomes: Option<mpsc::UnboundedSender<Evaluation>>,
}

impl JobContext {
    pub fn new(strategy: Arc<SlidingWindowStrategy>, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            strategy,
            metrics,
            outcomes: None,
        }
    }

    pub fn with_outcomes(mut self, outcomes: mpsc::UnboundedSender<Evaluation>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }
}
