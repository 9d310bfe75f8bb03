//! Core application primitives (worker pool, consume loop, lifecycle)

pub mod consumer;
pub mod http;
pub mod lifecycle;
pub mod runtime;

pub use consumer::ConsumeLoop;
pub use http::*;
pub use lifecycle::*;
pub use runtime::*;
