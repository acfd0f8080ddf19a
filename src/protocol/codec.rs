use super::schema::{
    GeneMeta, LineagePayload, ProtocolPayload, ValidationInfo, SCHEMA_VERSION, SUPPORTED_VERSIONS,
};
use crate::engines::generation::ast::{is_valid_gene_id, GeneExpression, Lineage, Node};
use crate::error::{Result, TradegeneError};

/// Wire record for `gene`. Missing validation and meta get defaults.
pub fn serialize(
    gene: &GeneExpression,
    validation: Option<ValidationInfo>,
    meta: Option<GeneMeta>,
) -> ProtocolPayload {
    ProtocolPayload {
        schema_version: SCHEMA_VERSION.to_string(),
        gene_id: gene.gene_id.clone(),
        ast: gene.root().to_payload(),
        formula: Some(gene.formula()),
        lineage: LineagePayload {
            parent_ids: gene.lineage.parent_ids.clone(),
            mutation_type: gene.lineage.mutation_type.clone(),
            generation: gene.generation,
        },
        validation: validation.unwrap_or_default(),
        meta: meta.unwrap_or_default(),
    }
}

/// Rebuild a gene from a current-version payload.
pub fn deserialize(payload: &ProtocolPayload) -> Result<(GeneExpression, ValidationInfo, GeneMeta)> {
    if !SUPPORTED_VERSIONS.contains(&payload.schema_version.as_str()) {
        return Err(TradegeneError::UnsupportedSchema(payload.schema_version.clone()));
    }
    if !is_valid_gene_id(&payload.gene_id) {
        return Err(TradegeneError::Protocol(format!("invalid gene_id '{}'", payload.gene_id)));
    }

    let root = Node::from_payload(&payload.ast)?;
    let gene = GeneExpression::new(root, payload.gene_id.clone())
        .with_generation(payload.lineage.generation)
        .with_lineage(Lineage {
            parent_ids: payload.lineage.parent_ids.clone(),
            mutation_type: payload.lineage.mutation_type.clone(),
        });

    Ok((gene, payload.validation.clone(), payload.meta.clone()))
}

pub fn to_json(payload: &ProtocolPayload) -> Result<String> {
    Ok(serde_json::to_string_pretty(payload)?)
}

pub fn from_json(json: &str) -> Result<ProtocolPayload> {
    Ok(serde_json::from_str(json)?)
}
