use super::schema::SUPPORTED_VERSIONS;
use crate::engines::generation::ast::{is_valid_gene_id, NodeType};
use serde_json::Value;

const REQUIRED_FIELDS: [&str; 4] = ["schema_version", "gene_id", "ast", "lineage"];

/// Structural check of a raw payload. Never fails; returns whether the
/// payload is acceptable together with every problem found.
pub fn validate(payload: &Value) -> (bool, Vec<String>) {
    let mut errors = Vec::new();

    let Some(obj) = payload.as_object() else {
        return (false, vec!["payload must be a JSON object".to_string()]);
    };

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            errors.push(format!("missing required field '{}'", field));
        }
    }

    if let Some(version) = obj.get("schema_version") {
        match version.as_str() {
            Some(v) if SUPPORTED_VERSIONS.contains(&v) => {}
            Some(v) => errors.push(format!("unsupported schema_version '{}'", v)),
            None => errors.push("schema_version must be a string".to_string()),
        }
    }

    if let Some(id) = obj.get("gene_id") {
        match id.as_str() {
            Some(id) if is_valid_gene_id(id) => {}
            _ => errors.push(format!("gene_id must be 16 lowercase hex characters, got {}", id)),
        }
    }

    if let Some(lineage) = obj.get("lineage") {
        if !lineage.is_object() {
            errors.push("lineage must be an object".to_string());
        }
    }

    if let Some(ast) = obj.get("ast") {
        check_node(ast, "ast", &mut errors);
    }

    (errors.is_empty(), errors)
}

fn check_node(node: &Value, path: &str, errors: &mut Vec<String>) {
    let Some(obj) = node.as_object() else {
        errors.push(format!("{}: node must be an object", path));
        return;
    };

    match obj.get("node_type").and_then(Value::as_str) {
        Some(t) if NodeType::parse(t).is_some() => {}
        Some(t) => errors.push(format!("{}: unknown node_type '{}'", path, t)),
        None => errors.push(format!("{}: missing node_type", path)),
    }

    match obj.get("children") {
        None | Some(Value::Null) => {}
        Some(Value::Array(children)) => {
            for (i, child) in children.iter().enumerate() {
                check_node(child, &format!("{}.children[{}]", path, i), errors);
            }
        }
        Some(_) => errors.push(format!("{}: children must be an array", path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reports_every_problem() {
        let payload = json!({
            "schema_version": "9.9",
            "gene_id": "xyz",
            "ast": {"node_type": "comparator", "children": [{"node_type": "lambda"}]}
        });
        let (ok, errors) = validate(&payload);
        assert!(!ok);
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("ast.children[0]")));
        assert!(errors.iter().any(|e| e.contains("lineage")));
    }

    #[test]
    fn test_non_object_payload() {
        let (ok, errors) = validate(&json!([1, 2]));
        assert!(!ok);
        assert_eq!(errors.len(), 1);
    }
}
