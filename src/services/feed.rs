//! Market data feed contract

use crate::errors::PipelineError;
use crate::models::price::PriceEvent;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::warn;

/// Receives pushes from a running feed.
///
/// Both callbacks run on the feed's own task, so they should do a bounded
/// amount of work and return.
#[async_trait]
pub trait PriceFeedHandler: Send + Sync {
    async fn on_price(&self, event: PriceEvent);

    async fn on_error(&self, error: &PipelineError);
}

/// Handle to a running feed: a stop request plus a completion notification
pub struct FeedSubscription {
    stop: Option<oneshot::Sender<()>>,
    done: JoinHandle<()>,
}

impl FeedSubscription {
    pub fn new(stop: oneshot::Sender<()>, done: JoinHandle<()>) -> Self {
        Self {
            stop: Some(stop),
            done,
        }
    }

    /// Ask the feed to stop without waiting for it
    pub fn request_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_finished()
    }

    /// Request a stop and wait until the feed task has exited
    pub async fn stop(mut self) {
        self.request_stop();
        if let Err(e) = self.done.await {
            warn!(error = %e, "Feed task ended abnormally");
        }
    }
}
