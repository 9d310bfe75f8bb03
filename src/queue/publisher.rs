//! Producer-side delivery contract: bounded retry on top of a single-shot log

use crate::errors::{PipelineError, Result};
use crate::queue::{Delivery, MessageLog};
use backon::{ConstantBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Upper bound on how long `Publisher::publish` waits between attempts
    pub fn total_backoff(&self) -> Duration {
        self.backoff * self.max_retries as u32
    }
}

#[derive(Clone)]
pub struct Publisher {
    log: Arc<dyn MessageLog>,
    policy: RetryPolicy,
}

impl Publisher {
    pub fn new(log: Arc<dyn MessageLog>) -> Self {
        Self::with_policy(log, RetryPolicy::default())
    }

    pub fn with_policy(log: Arc<dyn MessageLog>, policy: RetryPolicy) -> Self {
        Self { log, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Publish `value` under `key`, retrying transient failures with a fixed
    /// backoff. The last error is returned once retries run out.
    pub async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<Delivery> {
        let attempt = || async { self.log.publish(topic, key, value).await };

        attempt
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.policy.backoff)
                    .with_max_times(self.policy.max_retries),
            )
            .when(|e| matches!(e, PipelineError::Publish(_)))
            .notify(|e, delay| {
                warn!(topic = %topic, key = %key, error = %e, ?delay, "Publish failed, retrying");
            })
            .await
    }
}
