use super::{closes, mean, period_of, tail, Indicator, ParamSpec, Params};
use crate::types::Bar;

const PERIOD_14: [ParamSpec; 1] = [ParamSpec::period(14.0)];
const PERIOD_10: [ParamSpec; 1] = [ParamSpec::period(10.0)];
const PERIOD_20: [ParamSpec; 1] = [ParamSpec::period(20.0)];

/// Relative Strength Index (Wilder smoothing)
pub struct RSI;

impl Indicator for RSI {
    fn alias(&self) -> &'static str { "RSI" }
    fn ui_name(&self) -> &'static str { "Relative Strength Index" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_14 }
    fn value_range(&self) -> Option<(f64, f64)> { Some((0.0, 100.0)) }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_14[0]) + 1
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let period = period_of(params, &PERIOD_14[0]);
        let closes = closes(bars);
        if closes.len() < period + 1 {
            return None;
        }

        let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let (seed, rest) = deltas.split_at(period);

        let mut avg_gain = mean(&seed.iter().map(|d| d.max(0.0)).collect::<Vec<_>>());
        let mut avg_loss = mean(&seed.iter().map(|d| (-d).max(0.0)).collect::<Vec<_>>());

        let p = period as f64;
        for d in rest {
            avg_gain = (avg_gain * (p - 1.0) + d.max(0.0)) / p;
            avg_loss = (avg_loss * (p - 1.0) + (-d).max(0.0)) / p;
        }

        if avg_loss == 0.0 {
            return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

/// Price momentum: close minus close `period` bars ago
pub struct Momentum;

impl Indicator for Momentum {
    fn alias(&self) -> &'static str { "MOM" }
    fn ui_name(&self) -> &'static str { "Momentum" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_10 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_10[0]) + 1
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        Some(window[window.len() - 1].close - window[0].close)
    }
}

/// Rate of change in percent
pub struct ROC;

impl Indicator for ROC {
    fn alias(&self) -> &'static str { "ROC" }
    fn ui_name(&self) -> &'static str { "Rate of Change" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_10 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_10[0]) + 1
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        let base = window[0].close;
        if base == 0.0 {
            return Some(0.0);
        }
        Some((window[window.len() - 1].close / base - 1.0) * 100.0)
    }
}

/// Williams %R, in [-100, 0]
pub struct WilliamsR;

impl Indicator for WilliamsR {
    fn alias(&self) -> &'static str { "WILLR" }
    fn ui_name(&self) -> &'static str { "Williams %R" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_14 }
    fn value_range(&self) -> Option<(f64, f64)> { Some((-100.0, 0.0)) }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_14[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        let (hh, ll) = high_low(window);
        let close = window[window.len() - 1].close;
        if hh == ll {
            return Some(-50.0);
        }
        Some(-100.0 * (hh - close) / (hh - ll))
    }
}

/// Stochastic %K (unsmoothed)
pub struct Stochastic;

impl Indicator for Stochastic {
    fn alias(&self) -> &'static str { "STOCH" }
    fn ui_name(&self) -> &'static str { "Stochastic Oscillator" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_14 }
    fn value_range(&self) -> Option<(f64, f64)> { Some((0.0, 100.0)) }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_14[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        let (hh, ll) = high_low(window);
        let close = window[window.len() - 1].close;
        if hh == ll {
            return Some(50.0);
        }
        Some(100.0 * (close - ll) / (hh - ll))
    }
}

/// Commodity Channel Index on typical price
pub struct CCI;

impl Indicator for CCI {
    fn alias(&self) -> &'static str { "CCI" }
    fn ui_name(&self) -> &'static str { "Commodity Channel Index" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_20 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_20[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        let typical: Vec<f64> = window.iter().map(|b| (b.high + b.low + b.close) / 3.0).collect();
        let avg = mean(&typical);
        let mean_dev = mean(&typical.iter().map(|tp| (tp - avg).abs()).collect::<Vec<_>>());
        if mean_dev == 0.0 {
            return Some(0.0);
        }
        Some((typical[typical.len() - 1] - avg) / (0.015 * mean_dev))
    }
}

fn high_low(window: &[Bar]) -> (f64, f64) {
    window.iter().fold((f64::MIN, f64::MAX), |(hh, ll), b| {
        (hh.max(b.high), ll.min(b.low))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<Bar> {
        (0..n).map(|i| Bar::flat(100.0 + i as f64, 1.0)).collect()
    }

    fn params(period: f64) -> Params {
        let mut p = Params::new();
        p.insert("period".to_string(), period);
        p
    }

    #[test]
    fn test_rsi_extremes() {
        let up = rising(20);
        assert_eq!(RSI.calculate(&up, &params(14.0)), Some(100.0));

        let down: Vec<Bar> = up.iter().rev().copied().collect();
        assert_eq!(RSI.calculate(&down, &params(14.0)), Some(0.0));
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        assert_eq!(RSI.calculate(&rising(14), &params(14.0)), None);
        assert!(RSI.calculate(&rising(15), &params(14.0)).is_some());
    }

    #[test]
    fn test_momentum_and_roc() {
        let bars = rising(11);
        assert_eq!(Momentum.calculate(&bars, &params(10.0)), Some(10.0));
        let roc = ROC.calculate(&bars, &params(10.0)).unwrap();
        assert!((roc - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_stochastic_at_high() {
        let bars = rising(14);
        assert_eq!(Stochastic.calculate(&bars, &params(14.0)), Some(100.0));
        assert_eq!(WilliamsR.calculate(&bars, &params(14.0)), Some(0.0));
    }
}
