pub mod traits;
pub mod evolution;
pub mod backtesting;
pub mod parsing;
pub mod protocol;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use evolution::{EvolutionConfig, SelectionMethod};
pub use backtesting::BacktestingConfig;
pub use parsing::ParserConfig;
pub use protocol::ProtocolConfig;
pub use traits::ConfigSection;
