use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Signal,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Net of commission
    pub profit: f64,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone)]
pub struct Position {
    pub entry_bar: usize,
    pub entry_price: f64,
    pub size: f64,
    entry_cost: f64,
}

/// Long-only, fully invested account driven by a boolean signal.
pub struct Portfolio {
    pub initial_capital: f64,
    pub cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    commission: f64,
    slippage: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: vec![initial_capital],
            commission: 0.0,
            slippage: 0.0,
        }
    }

    pub fn with_costs(mut self, commission: f64, slippage: f64) -> Self {
        self.commission = commission;
        self.slippage = slippage;
        self
    }

    /// Enter on a rising signal, exit on a falling one, then mark to market.
    pub fn process_bar(&mut self, bar: usize, signal: bool, price: f64) {
        match (&self.position, signal) {
            (None, true) => self.open_position(bar, price),
            (Some(_), false) => self.close_position(bar, price, ExitReason::Signal),
            _ => {}
        }
        self.equity_curve.push(self.equity(price));
    }

    pub fn open_position(&mut self, bar: usize, price: f64) {
        let fill = price * (1.0 + self.slippage);
        if self.position.is_some() || fill <= 0.0 || !fill.is_finite() || self.cash <= 0.0 {
            return;
        }

        let fee = self.cash * self.commission;
        let size = (self.cash - fee) / fill;
        self.position = Some(Position {
            entry_bar: bar,
            entry_price: fill,
            size,
            entry_cost: self.cash,
        });
        self.cash = 0.0;
    }

    pub fn close_position(&mut self, bar: usize, price: f64, reason: ExitReason) {
        let Some(pos) = self.position.take() else {
            return;
        };

        let fill = price * (1.0 - self.slippage);
        let gross = fill * pos.size;
        let proceeds = gross - gross * self.commission;
        self.cash += proceeds;

        self.trades.push(Trade {
            entry_bar: pos.entry_bar,
            exit_bar: bar,
            entry_price: pos.entry_price,
            exit_price: fill,
            size: pos.size,
            profit: proceeds - pos.entry_cost,
            exit_reason: reason,
        });
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map(|p| p.size * price).unwrap_or(0.0)
    }

    pub fn final_balance(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(self.initial_capital)
    }

    pub fn get_trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn get_equity_curve(&self) -> &[f64] {
        &self.equity_curve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_without_costs() {
        let mut portfolio = Portfolio::new(1000.0);
        portfolio.process_bar(0, true, 10.0);
        portfolio.process_bar(1, true, 12.0);
        portfolio.process_bar(2, false, 11.0);

        assert_eq!(portfolio.trades.len(), 1);
        assert!((portfolio.trades[0].profit - 100.0).abs() < 1e-9);
        assert!((portfolio.final_balance() - 1100.0).abs() < 1e-9);
        assert_eq!(portfolio.equity_curve.len(), 4);
    }

    #[test]
    fn test_costs_reduce_profit() {
        let mut portfolio = Portfolio::new(1000.0).with_costs(0.01, 0.0);
        portfolio.open_position(0, 10.0);
        portfolio.close_position(1, 10.0, ExitReason::EndOfData);
        assert!(portfolio.trades[0].profit < 0.0);
    }
}
