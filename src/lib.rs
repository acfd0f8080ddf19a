pub mod config;
pub mod engines;
pub mod error;
pub mod functions;
pub mod protocol;
pub mod types;

pub use error::{Result, TradegeneError};
pub use types::{Bar, FitnessResult, MarketContext, Value};
