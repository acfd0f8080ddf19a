// src/engines/metrics/engine.rs
use crate::engines::evaluation::portfolio::Trade;
use crate::engines::metrics::{ProfitabilityMetrics, RiskMetrics};
use std::collections::BTreeMap;

pub struct MetricsEngine {
    initial_balance: f64,
    periods_per_year: f64,
}

impl MetricsEngine {
    pub fn new(initial_balance: f64, periods_per_year: f64) -> Self {
        Self {
            initial_balance,
            periods_per_year,
        }
    }

    pub fn calculate_all(&self, trades: &[Trade], equity_curve: &[f64]) -> BTreeMap<String, f64> {
        let mut all_metrics = ProfitabilityMetrics::calculate(trades);
        all_metrics.extend(RiskMetrics::calculate(equity_curve, self.periods_per_year));

        let final_balance = equity_curve.last().copied().unwrap_or(self.initial_balance);
        all_metrics.insert("num_trades".to_string(), trades.len() as f64);
        all_metrics.insert("final_balance".to_string(), final_balance);
        all_metrics.insert(
            "return_pct".to_string(),
            (final_balance - self.initial_balance) / self.initial_balance * 100.0,
        );

        all_metrics
    }
}
