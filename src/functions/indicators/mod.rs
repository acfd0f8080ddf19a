pub mod momentum;
pub mod trend;
pub mod volatility;
pub mod volume;

use crate::types::{Bar, MarketContext};
use std::collections::BTreeMap;

pub use momentum::{CCI, Momentum, RSI, ROC, Stochastic, WilliamsR};
pub use trend::{EMA, MACD, SMA, WMA};
pub use volatility::{ATR, BollingerLower, BollingerUpper, StdDev};
pub use volume::{OBV, VolumeSMA};

/// Indicator parameter map as stored on AST nodes
pub type Params = BTreeMap<String, f64>;

/// Declared parameter of an indicator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// Integer parameters (periods) are rounded after perturbation
    pub integer: bool,
}

impl ParamSpec {
    pub const fn period(default: f64) -> Self {
        Self {
            name: "period",
            default,
            min: 2.0,
            max: 200.0,
            integer: true,
        }
    }

    /// Round (if integral) and clamp a candidate value into range.
    pub fn normalize(&self, value: f64) -> f64 {
        let v = if self.integer { value.round() } else { value };
        v.clamp(self.min, self.max)
    }
}

/// Base trait for all indicators
pub trait Indicator: Send + Sync {
    /// Name used in formulas and on AST nodes
    fn alias(&self) -> &'static str;

    /// Display name
    fn ui_name(&self) -> &'static str;

    /// Ordered parameters; positional formula arguments map onto this order
    fn params(&self) -> &'static [ParamSpec];

    /// Expected value range, if bounded
    fn value_range(&self) -> Option<(f64, f64)> {
        None
    }

    /// Number of bars (including the current one) required for a reading
    fn lookback(&self, params: &Params) -> usize;

    /// Compute the reading for the last bar of `bars`. Returns `None` when
    /// `bars` is shorter than the lookback.
    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64>;
}

static INDICATORS: &[&dyn Indicator] = &[
    &SMA,
    &EMA,
    &WMA,
    &MACD,
    &RSI,
    &Momentum,
    &ROC,
    &WilliamsR,
    &Stochastic,
    &CCI,
    &ATR,
    &StdDev,
    &BollingerUpper,
    &BollingerLower,
    &OBV,
    &VolumeSMA,
];

/// Every registered indicator
pub fn all() -> &'static [&'static dyn Indicator] {
    INDICATORS
}

/// Look up an indicator by alias, ignoring case.
pub fn lookup(name: &str) -> Option<&'static dyn Indicator> {
    INDICATORS
        .iter()
        .copied()
        .find(|ind| ind.alias().eq_ignore_ascii_case(name))
}

/// Default parameter map for an indicator
pub fn default_params(indicator: &dyn Indicator) -> Params {
    indicator
        .params()
        .iter()
        .map(|spec| (spec.name.to_string(), spec.default))
        .collect()
}

/// Read a parameter, falling back to its declared default.
pub fn param(params: &Params, spec: &ParamSpec) -> f64 {
    params
        .get(spec.name)
        .copied()
        .map(|v| spec.normalize(v))
        .unwrap_or(spec.default)
}

pub(crate) fn period_of(params: &Params, spec: &ParamSpec) -> usize {
    param(params, spec).max(1.0) as usize
}

/// Canonical key for an indicator reading, e.g. `RSI(14)` or `MACD(12,26)`.
/// Parameters are written in declaration order, normalized the way
/// [`compute`] uses them, so `SMA(500)` and `SMA(200)` share a key. Unknown
/// keys are appended as `key=value` in map order.
pub fn canonical_key(name: &str, params: &Params) -> String {
    render(name, params, param)
}

/// Formula text for an indicator node. Same layout as [`canonical_key`]
/// but with the stored parameter values, so the text matches the AST.
pub fn formula_text(name: &str, params: &Params) -> String {
    render(name, params, |params, spec| {
        params.get(spec.name).copied().unwrap_or(spec.default)
    })
}

fn render(name: &str, params: &Params, value_of: impl Fn(&Params, &ParamSpec) -> f64) -> String {
    let mut parts = Vec::new();
    match lookup(name) {
        Some(ind) => {
            for spec in ind.params() {
                parts.push(format_number(value_of(params, spec)));
            }
            for (k, v) in params {
                if !ind.params().iter().any(|s| s.name == k) {
                    parts.push(format!("{}={}", k, format_number(*v)));
                }
            }
        }
        None => {
            for (k, v) in params {
                parts.push(format!("{}={}", k, format_number(*v)));
            }
        }
    }
    format!("{}({})", name, parts.join(","))
}

/// Indicator reading for the context's current bar.
///
/// Feed-supplied values win. Otherwise the reading is computed from history;
/// with insufficient history (or an unknown name) the current close is
/// returned instead.
pub fn compute(name: &str, params: &Params, ctx: &MarketContext) -> f64 {
    if let Some(v) = ctx.indicator(&canonical_key(name, params)) {
        return v;
    }

    let fallback = ctx.current().close;
    let Some(indicator) = lookup(name) else {
        return fallback;
    };

    let needed = indicator.lookback(params);
    if ctx.history().len() + 1 < needed {
        log::trace!(
            "{}: {} bars available, {} needed; using current close",
            indicator.alias(),
            ctx.history().len() + 1,
            needed
        );
        return fallback;
    }

    let bars = ctx.series();
    indicator.calculate(&bars, params).unwrap_or(fallback)
}

/// Format a number without a trailing `.0` for integral values.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

// Shared series helpers

pub(crate) fn tail<T>(values: &[T], n: usize) -> Option<&[T]> {
    if n == 0 || values.len() < n {
        None
    } else {
        Some(&values[values.len() - n..])
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Exponential moving average of the whole slice, seeded with the SMA of
/// the first `period` values.
pub(crate) fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut acc = mean(&values[..period]);
    for v in &values[period..] {
        acc = alpha * v + (1.0 - alpha) * acc;
    }
    Some(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("rsi").map(|i| i.alias()), Some("RSI"));
        assert!(lookup("NOPE").is_none());
    }

    #[test]
    fn test_canonical_key_orders_by_declaration() {
        let mut params = Params::new();
        params.insert("slow".to_string(), 26.0);
        params.insert("fast".to_string(), 12.0);
        assert_eq!(canonical_key("MACD", &params), "MACD(12,26)");

        let mut rsi = Params::new();
        rsi.insert("period".to_string(), 14.0);
        assert_eq!(canonical_key("RSI", &rsi), "RSI(14)");
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let values = [1.0, 2.0, 3.0];
        assert_eq!(ema(&values, 3), Some(2.0));
        assert_eq!(ema(&values, 4), None);
    }

    #[test]
    fn test_compute_falls_back_to_close() {
        let ctx = MarketContext::new(Bar::flat(42.0, 1.0));
        let mut params = Params::new();
        params.insert("period".to_string(), 14.0);
        assert_eq!(compute("SMA", &params, &ctx), 42.0);
        assert_eq!(compute("UNKNOWN", &params, &ctx), 42.0);
    }

    #[test]
    fn test_compute_prefers_feed_value() {
        let ctx = MarketContext::new(Bar::flat(42.0, 1.0)).with_indicator("RSI(14)", 25.0);
        let mut params = Params::new();
        params.insert("period".to_string(), 14.0);
        assert_eq!(compute("RSI", &params, &ctx), 25.0);
    }

    #[test]
    fn test_formula_text_keeps_stored_params() {
        let mut params = Params::new();
        params.insert("period".to_string(), 500.0);
        assert_eq!(formula_text("SMA", &params), "SMA(500)");
        assert_eq!(canonical_key("SMA", &params), "SMA(200)");
        assert_eq!(formula_text("SMA", &Params::new()), "SMA(20)");
    }
}
