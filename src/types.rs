use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default number of prior bars a context keeps.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { open, high, low, close, volume }
    }

    /// Flat bar where every price equals `price`.
    pub fn flat(price: f64, volume: f64) -> Self {
        Self::new(price, price, price, price, volume)
    }
}

/// Evaluation input for a gene: the current bar plus a bounded window of
/// prior bars (oldest first).
///
/// `indicator_values` lets a feed hand over indicator readings it already
/// computed. Keys are canonical indicator keys such as `RSI(14)`; a hit
/// takes precedence over computing from history.
#[derive(Debug, Clone)]
pub struct MarketContext {
    current: Bar,
    history: VecDeque<Bar>,
    capacity: usize,
    indicator_values: HashMap<String, f64>,
}

impl MarketContext {
    pub fn new(current: Bar) -> Self {
        Self::with_capacity(current, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(current: Bar, capacity: usize) -> Self {
        Self {
            current,
            history: VecDeque::with_capacity(capacity),
            capacity,
            indicator_values: HashMap::new(),
        }
    }

    /// Build a context whose current bar is the last element of `bars` and
    /// whose history holds the (at most `capacity`) bars before it.
    pub fn from_bars(bars: &[Bar], capacity: usize) -> Option<Self> {
        let (current, prior) = bars.split_last()?;
        let mut ctx = Self::with_capacity(*current, capacity);
        let start = prior.len().saturating_sub(capacity);
        ctx.history.extend(prior[start..].iter().copied());
        Some(ctx)
    }

    /// Move the window forward: the current bar joins the history and
    /// `bar` becomes current. Pre-computed indicator values are dropped
    /// because they described the previous bar.
    pub fn push(&mut self, bar: Bar) {
        if self.capacity > 0 {
            if self.history.len() == self.capacity {
                self.history.pop_front();
            }
            self.history.push_back(self.current);
        }
        self.current = bar;
        self.indicator_values.clear();
    }

    pub fn with_indicator(mut self, key: impl Into<String>, value: f64) -> Self {
        self.indicator_values.insert(key.into(), value);
        self
    }

    pub fn set_indicator(&mut self, key: impl Into<String>, value: f64) {
        self.indicator_values.insert(key.into(), value);
    }

    pub fn indicator(&self, key: &str) -> Option<f64> {
        self.indicator_values.get(key).copied()
    }

    pub fn current(&self) -> &Bar {
        &self.current
    }

    pub fn history(&self) -> &VecDeque<Bar> {
        &self.history
    }

    /// History followed by the current bar, oldest first.
    pub fn series(&self) -> Vec<Bar> {
        let mut bars: Vec<Bar> = self.history.iter().copied().collect();
        bars.push(self.current);
        bars
    }
}

/// Result of a single node evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
}

impl Value {
    /// Numbers are truthy when non-zero and not NaN.
    pub fn as_bool(self) -> bool {
        match self {
            Value::Bool(b) => b,
            Value::Number(n) => !n.is_nan() && n != 0.0,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Number(n) => n,
        }
    }
}

/// Outcome of the external fitness evaluator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitnessResult {
    pub fitness: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl FitnessResult {
    pub fn new(fitness: f64) -> Self {
        Self {
            fitness,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
