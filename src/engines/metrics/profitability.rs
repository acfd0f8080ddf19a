// src/engines/metrics/profitability.rs
use crate::engines::evaluation::portfolio::Trade;
use std::collections::BTreeMap;

pub struct ProfitabilityMetrics;

impl ProfitabilityMetrics {
    pub fn calculate(trades: &[Trade]) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        if trades.is_empty() {
            return metrics;
        }

        let (winning, losing): (Vec<&Trade>, Vec<&Trade>) = trades.iter().partition(|t| t.profit > 0.0);

        let win_rate = winning.len() as f64 / trades.len() as f64 * 100.0;
        metrics.insert("win_rate".to_string(), win_rate);

        let gross_profit: f64 = winning.iter().map(|t| t.profit).sum();
        let gross_loss: f64 = losing.iter().map(|t| t.profit.abs()).sum();

        if !winning.is_empty() {
            metrics.insert("avg_win".to_string(), gross_profit / winning.len() as f64);
        }
        if !losing.is_empty() {
            metrics.insert("avg_loss".to_string(), gross_loss / losing.len() as f64);
        }
        if gross_loss > 0.0 {
            metrics.insert("profit_factor".to_string(), gross_profit / gross_loss);
        }

        metrics
    }
}
