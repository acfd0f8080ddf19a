// src/engines/metrics/risk.rs
use std::collections::BTreeMap;

/// Equity-curve risk statistics. Sharpe and Sortino assume a zero
/// risk-free rate and are annualised with `periods_per_year`.
pub struct RiskMetrics;

impl RiskMetrics {
    pub fn calculate(equity_curve: &[f64], periods_per_year: f64) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        if equity_curve.len() < 2 {
            return metrics;
        }

        metrics.insert("max_drawdown_pct".to_string(), Self::max_drawdown(equity_curve));

        let returns = Self::calculate_returns(equity_curve);
        let volatility = Self::std_dev(&returns);
        metrics.insert("volatility".to_string(), volatility);

        let annualise = periods_per_year.max(1.0).sqrt();
        let avg_return = returns.iter().sum::<f64>() / returns.len() as f64;
        let sharpe = if volatility > 0.0 {
            avg_return / volatility * annualise
        } else {
            0.0
        };
        metrics.insert("sharpe_ratio".to_string(), sharpe);

        // Downside deviation over all periods, positive returns count as zero
        let downside = (returns.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>()
            / returns.len() as f64)
            .sqrt();
        let sortino = if downside > 0.0 {
            avg_return / downside * annualise
        } else {
            0.0
        };
        metrics.insert("sortino_ratio".to_string(), sortino);

        metrics
    }

    pub fn max_drawdown(equity: &[f64]) -> f64 {
        let mut max_dd = 0.0;
        let mut peak = match equity.first() {
            Some(v) => *v,
            None => return 0.0,
        };

        for &value in equity {
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                let dd = (peak - value) / peak * 100.0;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }

        max_dd
    }

    fn calculate_returns(equity: &[f64]) -> Vec<f64> {
        equity
            .windows(2)
            .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
            .collect()
    }

    fn std_dev(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

        variance.sqrt()
    }
}
