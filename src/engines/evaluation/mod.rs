pub mod evaluator;
pub mod backtester;
pub mod portfolio;

pub use evaluator::{evaluate, signal_series};
pub use backtester::{BacktestReport, SignalBacktester};
pub use portfolio::{Portfolio, Trade};
