use crate::engines::generation::ast::{Comparator, Node, Variable};
use crate::error::Result;
use crate::functions::indicators::Params;

fn period(value: usize) -> Params {
    let mut params = Params::new();
    params.insert("period".to_string(), value as f64);
    params
}

/// `SMA(fast) > SMA(slow)`: long while the fast average is above the slow one.
pub fn create_crossover_signal(fast: usize, slow: usize) -> Result<Node> {
    Ok(Node::compare(
        Comparator::Gt,
        Node::indicator("SMA", period(fast))?,
        Node::indicator("SMA", period(slow))?,
    ))
}

/// `RSI(period) < oversold`
pub fn create_rsi_signal(rsi_period: usize, oversold: f64) -> Result<Node> {
    Ok(Node::compare(
        Comparator::Lt,
        Node::indicator("RSI", period(rsi_period))?,
        Node::constant(oversold),
    ))
}

/// `close > BB_UPPER(period, 2)`
pub fn create_breakout_signal(band_period: usize) -> Result<Node> {
    let mut params = period(band_period);
    params.insert("std".to_string(), 2.0);
    Ok(Node::compare(
        Comparator::Gt,
        Node::variable(Variable::Close),
        Node::indicator("BB_UPPER", params)?,
    ))
}

/// `RSI(period) < oversold AND close > SMA(trend)`
pub fn create_trend_pullback_signal(rsi_period: usize, oversold: f64, trend: usize) -> Result<Node> {
    Ok(Node::and(
        create_rsi_signal(rsi_period, oversold)?,
        Node::compare(
            Comparator::Gt,
            Node::variable(Variable::Close),
            Node::indicator("SMA", period(trend))?,
        ),
    ))
}
