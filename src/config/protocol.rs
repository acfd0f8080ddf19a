use super::traits::ConfigSection;
use crate::engines::generation::parser::ParseMode;
use crate::error::TradegeneError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Lenient: formula-only legacy payloads get a placeholder AST.
    /// Strict: the formula is reparsed strictly and failures are errors.
    pub compat_mode: ParseMode,
    pub default_author: String,
    pub default_source: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            compat_mode: ParseMode::Lenient,
            default_author: "anonymous".to_string(),
            default_source: "tradegene".to_string(),
        }
    }
}

impl ConfigSection for ProtocolConfig {
    fn section_name() -> &'static str {
        "protocol"
    }

    fn validate(&self) -> Result<(), TradegeneError> {
        if self.default_source.trim().is_empty() {
            return Err(TradegeneError::Configuration(
                "Default source must not be empty".to_string()
            ));
        }
        Ok(())
    }
}
