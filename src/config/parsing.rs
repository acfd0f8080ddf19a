use super::traits::ConfigSection;
use crate::engines::generation::parser::ParseMode;
use crate::error::TradegeneError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub mode: ParseMode,
}

impl ConfigSection for ParserConfig {
    fn section_name() -> &'static str {
        "parser"
    }

    fn validate(&self) -> Result<(), TradegeneError> {
        Ok(())
    }
}
