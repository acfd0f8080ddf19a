use super::schema::{NodePayload, PLACEHOLDER_TAG, SCHEMA_VERSION, SUPPORTED_VERSIONS};
use crate::engines::generation::ast::{is_valid_gene_id, Comparator, Node, Variable};
use crate::engines::generation::parser::{FormulaParser, ParseMode};
use crate::error::{Result, TradegeneError};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

/// Legacy payloads carry a `0.x` version or none at all.
pub fn is_legacy_version(version: Option<&str>) -> bool {
    match version {
        None => true,
        Some(v) => v == "0" || v.starts_with("0."),
    }
}

pub fn needs_migration(payload: &Value) -> bool {
    payload
        .as_object()
        .map(|obj| {
            let version = obj.get("schema_version").and_then(Value::as_str);
            !version.map(|v| SUPPORTED_VERSIONS.contains(&v)).unwrap_or(false) && is_legacy_version(version)
        })
        .unwrap_or(false)
}

/// The AST given to formula-only payloads in lenient mode: `close > 0`.
pub fn placeholder_ast() -> Node {
    Node::compare(Comparator::Gt, Node::variable(Variable::Close), Node::constant(0.0))
}

/// Bring a payload up to the current schema version.
///
/// Current payloads pass through untouched. Legacy payloads get an empty
/// lineage where it is missing (generation taken from a top-level
/// `generation` field if present). A payload with only a `formula` gets the
/// placeholder AST and the `placeholder_ast` tag in lenient mode; in strict
/// mode the formula is parsed strictly and a failure is returned.
pub fn migrate(payload: Value, mode: ParseMode) -> Result<Value> {
    let Value::Object(mut obj) = payload else {
        return Err(TradegeneError::Protocol("payload must be a JSON object".to_string()));
    };

    let version = obj.get("schema_version").and_then(Value::as_str).map(str::to_string);
    if let Some(v) = version.as_deref() {
        if SUPPORTED_VERSIONS.contains(&v) {
            return Ok(Value::Object(obj));
        }
    }
    if !is_legacy_version(version.as_deref()) {
        return Err(TradegeneError::UnsupportedSchema(version.unwrap_or_default()));
    }

    log::debug!(
        "Migrating payload from schema {} to {}",
        version.as_deref().unwrap_or("<none>"),
        SCHEMA_VERSION
    );

    migrate_gene_id(&mut obj, mode)?;
    migrate_lineage(&mut obj);
    migrate_ast(&mut obj, mode)?;

    obj.insert("schema_version".to_string(), json!(SCHEMA_VERSION));
    Ok(Value::Object(obj))
}

/// Gene id derived from the payload content: the first 8 bytes of its
/// SHA-256, so the same legacy payload always migrates to the same id.
fn content_id(obj: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(Value::Object(obj.clone()).to_string().as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

fn migrate_gene_id(obj: &mut Map<String, Value>, mode: ParseMode) -> Result<()> {
    let current = obj.get("gene_id").and_then(Value::as_str);
    if current.map(is_valid_gene_id).unwrap_or(false) {
        return Ok(());
    }

    match mode {
        ParseMode::Strict => Err(TradegeneError::Protocol(format!(
            "legacy payload has invalid gene_id {:?}",
            current
        ))),
        ParseMode::Lenient => {
            let id = content_id(obj);
            log::warn!("Legacy payload gene_id {:?} replaced with {}", current, id);
            obj.insert("gene_id".to_string(), json!(id));
            Ok(())
        }
    }
}

fn migrate_lineage(obj: &mut Map<String, Value>) {
    let generation = obj.get("generation").and_then(Value::as_u64).unwrap_or(0);

    let lineage = obj
        .entry("lineage")
        .or_insert_with(|| json!({}));
    if !lineage.is_object() {
        *lineage = json!({});
    }
    if let Value::Object(lineage) = lineage {
        lineage.entry("parent_ids").or_insert_with(|| json!([]));
        lineage.entry("mutation_type").or_insert(Value::Null);
        lineage.entry("generation").or_insert_with(|| json!(generation));
    }
}

fn migrate_ast(obj: &mut Map<String, Value>, mode: ParseMode) -> Result<()> {
    if obj.get("ast").map(Value::is_object).unwrap_or(false) {
        return Ok(());
    }

    let formula = obj
        .get("formula")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TradegeneError::Protocol("legacy payload has neither ast nor formula".to_string()))?;

    let ast: NodePayload = match mode {
        ParseMode::Strict => FormulaParser::strict().parse(&formula)?.to_payload(),
        ParseMode::Lenient => {
            log::warn!("Formula-only payload '{}' given placeholder AST", formula);
            tag_placeholder(obj);
            placeholder_ast().to_payload()
        }
    };

    obj.insert("ast".to_string(), serde_json::to_value(ast)?);
    Ok(())
}

fn tag_placeholder(obj: &mut Map<String, Value>) {
    let meta = obj.entry("meta").or_insert_with(|| json!({}));
    if !meta.is_object() {
        *meta = json!({});
    }
    if let Value::Object(meta) = meta {
        let tags = meta.entry("tags").or_insert_with(|| json!([]));
        if !tags.is_array() {
            *tags = json!([]);
        }
        if let Value::Array(tags) = tags {
            tags.push(json!(PLACEHOLDER_TAG));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_versions() {
        assert!(is_legacy_version(None));
        assert!(is_legacy_version(Some("0.9")));
        assert!(!is_legacy_version(Some("2.0")));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let payload = json!({"schema_version": "2.0", "gene_id": "0123456789abcdef"});
        assert!(matches!(
            migrate(payload, ParseMode::Lenient),
            Err(TradegeneError::UnsupportedSchema(_))
        ));
    }

    #[test]
    fn test_lineage_filled_from_top_level_generation() {
        let payload = json!({
            "gene_id": "0123456789abcdef",
            "generation": 7,
            "ast": placeholder_ast().to_payload(),
        });
        let migrated = migrate(payload, ParseMode::Strict).unwrap();
        assert_eq!(migrated["lineage"]["generation"], json!(7));
        assert_eq!(migrated["lineage"]["parent_ids"], json!([]));
        assert_eq!(migrated["schema_version"], json!(SCHEMA_VERSION));
    }

    #[test]
    fn test_missing_gene_id_is_derived_from_content() {
        let payload = json!({"schema_version": "0.9", "formula": "close > 1"});
        let first = migrate(payload.clone(), ParseMode::Lenient).unwrap();
        let second = migrate(payload, ParseMode::Lenient).unwrap();
        assert_eq!(first["gene_id"], json!("9e7ef13599319b35"));
        assert_eq!(first["gene_id"], second["gene_id"]);

        let strict = json!({"schema_version": "0.9", "formula": "close > 1"});
        assert!(migrate(strict, ParseMode::Strict).is_err());
    }
}
