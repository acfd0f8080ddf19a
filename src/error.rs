use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradegeneError {
    #[error("Invalid arity for {node}: expected {expected} children, got {actual}")]
    InvalidArity {
        node: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid variable name: {0}")]
    InvalidVariable(String),

    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("Unknown operator symbol: {0}")]
    UnknownOperator(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unsupported schema version: {0}")]
    UnsupportedSchema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Config source error: {0}")]
    Config(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, TradegeneError>;
