use crate::config::ProtocolConfig;
use crate::engines::generation::ast::{Comparator, Node, NodeKind, NodeType, Operator, Variable};
use crate::error::{Result, TradegeneError};
use crate::functions::indicators::Params;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version written by this crate
pub const SCHEMA_VERSION: &str = "1.0";
/// Versions accepted without migration
pub const SUPPORTED_VERSIONS: &[&str] = &[SCHEMA_VERSION];
/// Tag attached to genes whose AST was synthesised during migration
pub const PLACEHOLDER_TAG: &str = "placeholder_ast";

/// Wire form of one node.
///
/// `operator` carries the symbol of both operators and comparators; `name`
/// carries the indicator or variable name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePayload {
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodePayload>,
}

impl NodePayload {
    fn leaf(node_type: NodeType) -> Self {
        Self {
            node_type: node_type.as_str().to_string(),
            operator: None,
            name: None,
            params: None,
            value: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineagePayload {
    #[serde(default)]
    pub parent_ids: Vec<String>,
    #[serde(default)]
    pub mutation_type: Option<String>,
    #[serde(default)]
    pub generation: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    #[default]
    Pending,
    Passed,
    Failed,
}

/// Measured performance attached to a gene. Never read by evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationInfo {
    #[serde(default)]
    pub status: ValidationStatus,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl ValidationInfo {
    pub fn with_status(status: ValidationStatus) -> Self {
        Self {
            status,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Provenance attached to a gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneMeta {
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_author() -> String {
    ProtocolConfig::default().default_author
}

fn default_source() -> String {
    ProtocolConfig::default().default_source
}

impl Default for GeneMeta {
    fn default() -> Self {
        Self {
            author: default_author(),
            created_at: Utc::now(),
            source: default_source(),
            tags: Vec::new(),
        }
    }
}

impl GeneMeta {
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self {
            author: config.default_author.clone(),
            source: config.default_source.clone(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.tags.iter().any(|t| t == PLACEHOLDER_TAG)
    }
}

/// One exchanged gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolPayload {
    pub schema_version: String,
    pub gene_id: String,
    pub ast: NodePayload,
    /// Rendered formula, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    pub lineage: LineagePayload,
    #[serde(default)]
    pub validation: ValidationInfo,
    #[serde(default)]
    pub meta: GeneMeta,
}

impl Node {
    /// Lossless wire form of this subtree
    pub fn to_payload(&self) -> NodePayload {
        let mut payload = NodePayload::leaf(self.node_type());
        match self.kind() {
            NodeKind::Operator(op) => payload.operator = Some(op.symbol().to_string()),
            NodeKind::Comparator(cmp) => payload.operator = Some(cmp.symbol().to_string()),
            NodeKind::Indicator { name, params } => {
                payload.name = Some(name.clone());
                payload.params = Some(params.clone());
            }
            NodeKind::Constant(v) => payload.value = Some(*v),
            NodeKind::Variable(var) => payload.name = Some(var.name().to_string()),
        }
        payload.children = self.children().iter().map(Node::to_payload).collect();
        payload
    }

    /// Rebuild a subtree through the checked constructors, so a payload
    /// with a wrong child count or unknown name is rejected.
    pub fn from_payload(payload: &NodePayload) -> Result<Node> {
        let node_type = NodeType::parse(&payload.node_type).ok_or_else(|| {
            TradegeneError::Protocol(format!("unknown node_type '{}'", payload.node_type))
        })?;

        let kind = match node_type {
            NodeType::Operator => {
                let symbol = required(&payload.operator, "operator")?;
                NodeKind::Operator(
                    Operator::from_symbol(symbol)
                        .ok_or_else(|| TradegeneError::UnknownOperator(symbol.to_string()))?,
                )
            }
            NodeType::Comparator => {
                let symbol = required(&payload.operator, "operator")?;
                NodeKind::Comparator(
                    Comparator::from_symbol(symbol)
                        .ok_or_else(|| TradegeneError::UnknownOperator(symbol.to_string()))?,
                )
            }
            NodeType::Indicator => NodeKind::Indicator {
                name: required(&payload.name, "name")?.to_string(),
                params: payload.params.clone().unwrap_or_default(),
            },
            NodeType::Constant => NodeKind::Constant(
                payload
                    .value
                    .ok_or_else(|| TradegeneError::Protocol("constant node without value".to_string()))?,
            ),
            NodeType::Variable => NodeKind::Variable(required(&payload.name, "name")?.parse::<Variable>()?),
        };

        let children = payload
            .children
            .iter()
            .map(Node::from_payload)
            .collect::<Result<Vec<_>>>()?;
        Node::new(kind, children)
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| TradegeneError::Protocol(format!("node is missing '{}'", name)))
}
