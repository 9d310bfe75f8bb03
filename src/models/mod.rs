//! Shared data models spanning the pipeline stages.

pub mod price;
pub mod signal;

pub use price::PriceEvent;
pub use signal::{Classification, Evaluation, Signal};
