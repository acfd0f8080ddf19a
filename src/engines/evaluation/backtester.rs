use crate::{
    config::{BacktestingConfig, ConfigSection},
    engines::evaluation::{evaluator::signal_series, portfolio::{ExitReason, Portfolio, Trade}},
    engines::generation::{ast::Node, evolution_engine::FitnessEvaluator, GeneExpression},
    engines::metrics::MetricsEngine,
    error::Result,
    types::{Bar, FitnessResult},
};
use std::{collections::BTreeMap, sync::Arc};

#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub metrics: BTreeMap<String, f64>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
}

impl BacktestReport {
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }
}

/// Long-only backtest of a boolean signal over a fixed bar series.
///
/// The position is held while the gene evaluates true at a bar's close and
/// is flattened on the last bar. Fitness is the annualised Sharpe ratio;
/// genes that never trade score `no_trade_fitness`.
#[derive(Clone)]
pub struct SignalBacktester {
    bars: Arc<Vec<Bar>>,
    config: BacktestingConfig,
}

impl SignalBacktester {
    pub fn new(bars: Vec<Bar>, config: BacktestingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            bars: Arc::new(bars),
            config,
        })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn run(&self, root: &Node) -> BacktestReport {
        let signals = signal_series(root, &self.bars, self.config.history_capacity);
        let mut portfolio = Portfolio::new(self.config.initial_capital)
            .with_costs(self.config.commission, self.config.slippage);

        for (i, (bar, signal)) in self.bars.iter().zip(&signals).enumerate() {
            portfolio.process_bar(i, *signal, bar.close);
        }
        if let Some(last) = self.bars.last() {
            portfolio.close_position(self.bars.len() - 1, last.close, ExitReason::EndOfData);
            if let Some(equity) = portfolio.equity_curve.last_mut() {
                *equity = portfolio.cash;
            }
        }

        let metrics = MetricsEngine::new(self.config.initial_capital, self.config.periods_per_year)
            .calculate_all(portfolio.get_trades(), portfolio.get_equity_curve());

        BacktestReport {
            metrics,
            trades: portfolio.trades,
            equity_curve: portfolio.equity_curve,
        }
    }
}

impl FitnessEvaluator for SignalBacktester {
    fn evaluate(&self, gene: &GeneExpression) -> FitnessResult {
        let report = self.run(gene.root());

        let fitness = if report.trades.is_empty() {
            self.config.no_trade_fitness
        } else {
            let sharpe = report.metric("sharpe_ratio");
            if sharpe.is_finite() {
                sharpe
            } else {
                self.config.no_trade_fitness
            }
        };

        let mut result = FitnessResult::new(fitness);
        for (name, value) in &report.metrics {
            if value.is_finite() {
                result = result.with_metadata(name.as_str(), *value);
            }
        }
        result
    }
}
