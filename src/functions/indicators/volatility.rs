use super::{closes, mean, param, period_of, tail, Indicator, ParamSpec, Params};
use crate::types::Bar;

const PERIOD_14: [ParamSpec; 1] = [ParamSpec::period(14.0)];
const PERIOD_20: [ParamSpec; 1] = [ParamSpec::period(20.0)];

const BAND_PARAMS: [ParamSpec; 2] = [
    ParamSpec::period(20.0),
    ParamSpec {
        name: "std",
        default: 2.0,
        min: 0.5,
        max: 4.0,
        integer: false,
    },
];

/// Average True Range (Wilder smoothing)
pub struct ATR;

impl Indicator for ATR {
    fn alias(&self) -> &'static str { "ATR" }
    fn ui_name(&self) -> &'static str { "Average True Range" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_14 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_14[0]) + 1
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let period = period_of(params, &PERIOD_14[0]);
        if bars.len() < period + 1 {
            return None;
        }

        let true_ranges: Vec<f64> = bars
            .windows(2)
            .map(|w| {
                let (prev, bar) = (w[0], w[1]);
                (bar.high - bar.low)
                    .max((bar.high - prev.close).abs())
                    .max((bar.low - prev.close).abs())
            })
            .collect();

        let (seed, rest) = true_ranges.split_at(period);
        let p = period as f64;
        let atr = rest
            .iter()
            .fold(mean(seed), |acc, tr| (acc * (p - 1.0) + tr) / p);
        Some(atr)
    }
}

/// Population standard deviation of closes
pub struct StdDev;

impl Indicator for StdDev {
    fn alias(&self) -> &'static str { "STDDEV" }
    fn ui_name(&self) -> &'static str { "Standard Deviation" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_20 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_20[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        Some(std_dev(&closes(window)))
    }
}

/// Upper Bollinger band
pub struct BollingerUpper;

impl Indicator for BollingerUpper {
    fn alias(&self) -> &'static str { "BB_UPPER" }
    fn ui_name(&self) -> &'static str { "Bollinger Upper Band" }
    fn params(&self) -> &'static [ParamSpec] { &BAND_PARAMS }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &BAND_PARAMS[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let (mid, dev) = band(bars, params)?;
        Some(mid + dev)
    }
}

/// Lower Bollinger band
pub struct BollingerLower;

impl Indicator for BollingerLower {
    fn alias(&self) -> &'static str { "BB_LOWER" }
    fn ui_name(&self) -> &'static str { "Bollinger Lower Band" }
    fn params(&self) -> &'static [ParamSpec] { &BAND_PARAMS }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &BAND_PARAMS[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let (mid, dev) = band(bars, params)?;
        Some(mid - dev)
    }
}

fn band(bars: &[Bar], params: &Params) -> Option<(f64, f64)> {
    let window = tail(bars, period_of(params, &BAND_PARAMS[0]))?;
    let closes = closes(window);
    let width = param(params, &BAND_PARAMS[1]);
    Some((mean(&closes), width * std_dev(&closes)))
}

fn std_dev(values: &[f64]) -> f64 {
    let avg = mean(values);
    mean(&values.iter().map(|v| (v - avg).powi(2)).collect::<Vec<_>>()).sqrt()
}
