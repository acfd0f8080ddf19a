use super::{closes, ema, mean, param, period_of, tail, Indicator, ParamSpec, Params};
use crate::types::Bar;

const PERIOD_20: [ParamSpec; 1] = [ParamSpec::period(20.0)];

const MACD_PARAMS: [ParamSpec; 2] = [
    ParamSpec {
        name: "fast",
        default: 12.0,
        min: 2.0,
        max: 100.0,
        integer: true,
    },
    ParamSpec {
        name: "slow",
        default: 26.0,
        min: 3.0,
        max: 200.0,
        integer: true,
    },
];

/// Simple moving average of closes
pub struct SMA;

impl Indicator for SMA {
    fn alias(&self) -> &'static str { "SMA" }
    fn ui_name(&self) -> &'static str { "Simple Moving Average" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_20 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_20[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        Some(mean(&closes(window)))
    }
}

/// Exponential moving average of closes
pub struct EMA;

impl Indicator for EMA {
    fn alias(&self) -> &'static str { "EMA" }
    fn ui_name(&self) -> &'static str { "Exponential Moving Average" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_20 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_20[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        ema(&closes(bars), self.lookback(params))
    }
}

/// Linearly weighted moving average of closes
pub struct WMA;

impl Indicator for WMA {
    fn alias(&self) -> &'static str { "WMA" }
    fn ui_name(&self) -> &'static str { "Weighted Moving Average" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_20 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_20[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        let (sum, weights) = window
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sum, weights), (i, b)| {
                let w = (i + 1) as f64;
                (sum + w * b.close, weights + w)
            });
        Some(sum / weights)
    }
}

/// MACD line: EMA(fast) - EMA(slow)
pub struct MACD;

impl Indicator for MACD {
    fn alias(&self) -> &'static str { "MACD" }
    fn ui_name(&self) -> &'static str { "MACD Line" }
    fn params(&self) -> &'static [ParamSpec] { &MACD_PARAMS }

    fn lookback(&self, params: &Params) -> usize {
        let fast = param(params, &MACD_PARAMS[0]) as usize;
        let slow = param(params, &MACD_PARAMS[1]) as usize;
        fast.max(slow)
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let closes = closes(bars);
        let fast = ema(&closes, param(params, &MACD_PARAMS[0]) as usize)?;
        let slow = ema(&closes, param(params, &MACD_PARAMS[1]) as usize)?;
        Some(fast - slow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<Bar> {
        values.iter().map(|v| Bar::flat(*v, 1.0)).collect()
    }

    #[test]
    fn test_sma_uses_last_period_bars() {
        let bars = series(&[100.0, 1.0, 2.0, 3.0]);
        let mut p = Params::new();
        p.insert("period".to_string(), 3.0);
        assert_eq!(SMA.calculate(&bars, &p), Some(2.0));
    }

    #[test]
    fn test_wma_weights_recent_bars() {
        let bars = series(&[1.0, 2.0, 3.0]);
        let mut p = Params::new();
        p.insert("period".to_string(), 3.0);
        let wma = WMA.calculate(&bars, &p).unwrap();
        assert!((wma - 14.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let bars = series(&[50.0; 40]);
        let macd = MACD.calculate(&bars, &Params::new()).unwrap();
        assert!(macd.abs() < 1e-12);
    }
}
