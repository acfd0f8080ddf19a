use super::{
    backtesting::BacktestingConfig,
    evolution::EvolutionConfig,
    parsing::ParserConfig,
    protocol::ProtocolConfig,
    traits::ConfigSection,
};
use crate::error::TradegeneError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Environment variable prefix for layered overrides,
/// e.g. `TRADEGENE__EVOLUTION__POPULATION_SIZE=80`.
pub const ENV_PREFIX: &str = "TRADEGENE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub backtesting: BacktestingConfig,
    pub parser: ParserConfig,
    pub protocol: ProtocolConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), TradegeneError> {
        self.evolution.validate()?;
        self.backtesting.validate()?;
        self.parser.validate()?;
        self.protocol.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TradegeneError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TradegeneError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;

        *self.write()? = config;
        Ok(())
    }

    /// Load an optional file (TOML or JSON, chosen by extension) and apply
    /// `TRADEGENE__SECTION__KEY` environment overrides on top of it.
    pub fn load_layered<P: AsRef<Path>>(&self, path: Option<P>) -> Result<(), TradegeneError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path.as_ref()).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        log::debug!("Loaded layered configuration: {:?}", config);
        *self.write()? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TradegeneError> {
        let toml_str = toml::to_string_pretty(&self.get()?)?;

        std::fs::write(path, toml_str)
            .map_err(|e| TradegeneError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> Result<AppConfig, TradegeneError> {
        self.config
            .read()
            .map(|c| c.clone())
            .map_err(|_| TradegeneError::Configuration("Config lock poisoned".to_string()))
    }

    /// Apply `f` to a copy of the config; the change is kept only if the
    /// result validates.
    pub fn update<F>(&self, f: F) -> Result<(), TradegeneError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get()?;
        f(&mut candidate);
        candidate.validate()?;
        *self.write()? = candidate;
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, AppConfig>, TradegeneError> {
        self.config
            .write()
            .map_err(|_| TradegeneError::Configuration("Config lock poisoned".to_string()))
    }
}
