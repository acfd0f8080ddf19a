//! Versioned wire format for exchanging genes.
//!
//! A payload couples the AST with provenance (`meta`), measured
//! performance (`validation`) and ancestry (`lineage`). Only the AST takes
//! part in evaluation.

pub mod codec;
pub mod migration;
pub mod schema;
pub mod validation;

pub use codec::{deserialize, from_json, serialize, to_json};
pub use migration::{migrate, needs_migration, placeholder_ast};
pub use schema::{
    GeneMeta, LineagePayload, NodePayload, ProtocolPayload, ValidationInfo, ValidationStatus,
    PLACEHOLDER_TAG, SCHEMA_VERSION, SUPPORTED_VERSIONS,
};
pub use validation::validate;

use crate::config::ProtocolConfig;
use crate::engines::generation::ast::GeneExpression;
use crate::engines::generation::parser::ParseMode;
use crate::error::{Result, TradegeneError};

/// Migrate if needed, validate, then deserialize a raw payload.
pub fn decode(
    payload: serde_json::Value,
    mode: ParseMode,
) -> Result<(GeneExpression, ValidationInfo, GeneMeta)> {
    let payload = if needs_migration(&payload) {
        migrate(payload, mode)?
    } else {
        payload
    };

    let (ok, errors) = validate(&payload);
    if !ok {
        return Err(TradegeneError::Protocol(errors.join("; ")));
    }

    let payload: ProtocolPayload = serde_json::from_value(payload)?;
    deserialize(&payload)
}

/// [`decode`] using the configured compatibility mode.
pub fn decode_with_config(
    payload: serde_json::Value,
    config: &ProtocolConfig,
) -> Result<(GeneExpression, ValidationInfo, GeneMeta)> {
    decode(payload, config.compat_mode)
}
