use super::traits::ConfigSection;
use crate::error::TradegeneError;
use serde::{Deserialize, Serialize};

/// Settings for the reference signal backtester
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestingConfig {
    pub initial_capital: f64,
    /// Fraction of notional charged per side
    pub commission: f64,
    /// Fraction of price lost per fill
    pub slippage: f64,
    /// Bars per year, used to annualise Sharpe and Sortino
    pub periods_per_year: f64,
    /// Prior bars kept in the evaluation context
    pub history_capacity: usize,
    /// Fitness assigned to strategies that never trade
    pub no_trade_fitness: f64,
}

impl Default for BacktestingConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10000.0,
            commission: 0.001,
            slippage: 0.0005,
            periods_per_year: 252.0,
            history_capacity: 256,
            no_trade_fitness: -1.0,
        }
    }
}

impl ConfigSection for BacktestingConfig {
    fn section_name() -> &'static str {
        "backtesting"
    }

    fn validate(&self) -> Result<(), TradegeneError> {
        if self.initial_capital <= 0.0 {
            return Err(TradegeneError::Configuration(
                "Initial capital must be positive".to_string()
            ));
        }
        if self.commission < 0.0 || self.slippage < 0.0 {
            return Err(TradegeneError::Configuration(
                "Commission and slippage must be non-negative".to_string()
            ));
        }
        if self.periods_per_year <= 0.0 {
            return Err(TradegeneError::Configuration(
                "Periods per year must be positive".to_string()
            ));
        }
        Ok(())
    }
}
