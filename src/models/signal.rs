use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    /// Latest price sits more than the threshold below the moving average
    Dip,
    Stable,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Dip => "dip",
            Classification::Stable => "stable",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived from a full window, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub current_price: f64,
    pub moving_average: f64,
    pub classification: Classification,
}

impl Signal {
    pub fn is_dip(&self) -> bool {
        self.classification == Classification::Dip
    }
}

/// Outcome of running the strategy on one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    /// Window not full yet, no average computed
    Collecting {
        symbol: String,
        len: usize,
        capacity: usize,
    },
    Signal(Signal),
}

impl Evaluation {
    pub fn symbol(&self) -> &str {
        match self {
            Evaluation::Collecting { symbol, .. } => symbol,
            Evaluation::Signal(signal) => &signal.symbol,
        }
    }

    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Evaluation::Signal(signal) => Some(signal),
            Evaluation::Collecting { .. } => None,
        }
    }
}
