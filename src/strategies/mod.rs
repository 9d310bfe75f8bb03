//! Trading strategies evaluated by the worker pool.

pub mod sliding_window;

pub use sliding_window::{
    classify, moving_average, parse_price, SlidingWindowStrategy, StrategyConfig,
    DEFAULT_DIP_THRESHOLD, DEFAULT_WINDOW_SIZE,
};
