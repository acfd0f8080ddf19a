use crate::error::TradegeneError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), TradegeneError>;
}

/// Reject a rate outside [0, 1] (NaN included).
pub(crate) fn check_rate(name: &str, value: f64) -> Result<(), TradegeneError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TradegeneError::Configuration(format!(
            "{} must be between 0 and 1, got {}",
            name, value
        )));
    }
    Ok(())
}
