//! Dip detection against a moving average of the last N prices
//!
//! The window lives in the shared store as a newest-first list. Each job does
//! push, trim and read as three separate store calls with no lock around them,
//! so two workers on the same symbol can interleave. The window may briefly
//! hold more than N entries; the trim after every push keeps it bounded.

use crate::cache::PriceStore;
use crate::errors::{PipelineError, Result};
use crate::jobs::types::Job;
use crate::models::signal::{Classification, Evaluation, Signal};
use std::sync::Arc;

pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Fraction below the average that counts as a dip (1%)
pub const DEFAULT_DIP_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyConfig {
    pub window_size: usize,
    pub dip_threshold: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            dip_threshold: DEFAULT_DIP_THRESHOLD,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(PipelineError::Config("window size must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.dip_threshold) {
            return Err(PipelineError::Config(format!(
                "dip threshold must be in [0, 1), got {}",
                self.dip_threshold
            )));
        }
        Ok(())
    }
}

/// Parse a price string as sent by the exchange
pub fn parse_price(raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|e: std::num::ParseFloatError| {
        PipelineError::Parse {
            value: raw.to_string(),
            reason: e.to_string(),
        }
    })?;
    if !value.is_finite() {
        return Err(PipelineError::Parse {
            value: raw.to_string(),
            reason: "not a finite number".to_string(),
        });
    }
    Ok(value)
}

/// Arithmetic mean of the window. Any unparseable entry fails the whole window.
pub fn moving_average(window: &[String]) -> Result<f64> {
    if window.is_empty() {
        return Err(PipelineError::Parse {
            value: String::new(),
            reason: "empty window".to_string(),
        });
    }
    let sum = window
        .iter()
        .map(|p| parse_price(p))
        .sum::<Result<f64>>()?;
    Ok(sum / window.len() as f64)
}

/// Classify `current` against the mean of `window`
pub fn classify(symbol: &str, current: &str, window: &[String], dip_threshold: f64) -> Result<Signal> {
    let moving_average = moving_average(window)?;
    let current_price = parse_price(current)?;

    let classification = if current_price < moving_average * (1.0 - dip_threshold) {
        Classification::Dip
    } else {
        Classification::Stable
    };

    Ok(Signal {
        symbol: symbol.to_string(),
        current_price,
        moving_average,
        classification,
    })
}

pub struct SlidingWindowStrategy {
    store: Arc<dyn PriceStore>,
    config: StrategyConfig,
}

impl SlidingWindowStrategy {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self {
            store,
            config: StrategyConfig::default(),
        }
    }

    pub fn with_config(store: Arc<dyn PriceStore>, config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> StrategyConfig {
        self.config
    }

    /// Record `job.price` in the window and evaluate it.
    ///
    /// Store failures come back as `CacheReadWrite`, malformed prices as
    /// `Parse` before anything is written. Either way nothing beyond this job
    /// is affected.
    pub async fn evaluate(&self, job: &Job) -> Result<Evaluation> {
        let capacity = self.config.window_size;

        // A price that cannot be classified never enters the window.
        parse_price(&job.price)?;

        // Trim even when the push errored: the push may have landed anyway.
        let pushed = self.store.push_history(&job.symbol, &job.price).await;
        let trimmed = self.store.trim_history(&job.symbol, capacity).await;
        pushed?;
        trimmed?;

        let history = self.store.read_history(&job.symbol).await?;
        if history.len() < capacity {
            return Ok(Evaluation::Collecting {
                symbol: job.symbol.clone(),
                len: history.len(),
                capacity,
            });
        }

        // A concurrent push can show up before its trim; only the newest N count.
        let window = &history[..capacity];
        let signal = classify(&job.symbol, &job.price, window, self.config.dip_threshold)?;
        Ok(Evaluation::Signal(signal))
    }
}
