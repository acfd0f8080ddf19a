use super::{mean, period_of, tail, Indicator, ParamSpec, Params};
use crate::types::Bar;

const PERIOD_20: [ParamSpec; 1] = [ParamSpec::period(20.0)];

/// On-balance volume accumulated over the available history
pub struct OBV;

impl Indicator for OBV {
    fn alias(&self) -> &'static str { "OBV" }
    fn ui_name(&self) -> &'static str { "On Balance Volume" }
    fn params(&self) -> &'static [ParamSpec] { &[] }

    fn lookback(&self, _params: &Params) -> usize {
        2
    }

    fn calculate(&self, bars: &[Bar], _params: &Params) -> Option<f64> {
        if bars.len() < 2 {
            return None;
        }
        let obv = bars.windows(2).fold(0.0, |acc, w| {
            if w[1].close > w[0].close {
                acc + w[1].volume
            } else if w[1].close < w[0].close {
                acc - w[1].volume
            } else {
                acc
            }
        });
        Some(obv)
    }
}

/// Moving average of volume
pub struct VolumeSMA;

impl Indicator for VolumeSMA {
    fn alias(&self) -> &'static str { "VOLUME_SMA" }
    fn ui_name(&self) -> &'static str { "Volume Moving Average" }
    fn params(&self) -> &'static [ParamSpec] { &PERIOD_20 }

    fn lookback(&self, params: &Params) -> usize {
        period_of(params, &PERIOD_20[0])
    }

    fn calculate(&self, bars: &[Bar], params: &Params) -> Option<f64> {
        let window = tail(bars, self.lookback(params))?;
        Some(mean(&window.iter().map(|b| b.volume).collect::<Vec<_>>()))
    }
}
