//! In-process job handling between the message log and the strategy

pub mod context;
pub mod handlers;
pub mod queue;
pub mod types;

pub use context::JobContext;
pub use queue::{EnqueueError, JobQueue, JobReceiver, JobSender, DEFAULT_JOB_QUEUE_CAPACITY};
pub use types::Job;
