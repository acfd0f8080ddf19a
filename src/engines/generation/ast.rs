use crate::engines::evaluation::evaluator;
use crate::error::{Result, TradegeneError};
use crate::functions::indicators::{self, format_number, Params};
use crate::types::{Bar, MarketContext, Value};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a gene id in hex characters
pub const GENE_ID_LEN: usize = 16;

/// Child-index path from the root to a node. The root is the empty path.
pub type NodePath = Vec<usize>;

/// Operator family; point mutation only swaps within a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorFamily {
    Boolean,
    Arithmetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    And,
    Or,
    Not,
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::And,
        Operator::Or,
        Operator::Not,
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
    ];

    pub fn arity(self) -> usize {
        match self {
            Operator::Not => 1,
            _ => 2,
        }
    }

    pub fn family(self) -> OperatorFamily {
        match self {
            Operator::And | Operator::Or | Operator::Not => OperatorFamily::Boolean,
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div => OperatorFamily::Arithmetic,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim().to_ascii_uppercase().as_str() {
            "AND" | "&&" => Some(Operator::And),
            "OR" | "||" => Some(Operator::Or),
            "NOT" | "!" => Some(Operator::Not),
            "+" => Some(Operator::Add),
            "-" | "−" => Some(Operator::Sub),
            "*" | "×" => Some(Operator::Mul),
            "/" | "÷" => Some(Operator::Div),
            _ => None,
        }
    }

    /// Other operators sharing this operator's family and arity
    pub fn siblings(self) -> impl Iterator<Item = Operator> {
        Operator::ALL
            .into_iter()
            .filter(move |op| *op != self && op.family() == self.family() && op.arity() == self.arity())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Comparator {
    pub const ALL: [Comparator; 6] = [
        Comparator::Gt,
        Comparator::Lt,
        Comparator::Ge,
        Comparator::Le,
        Comparator::Eq,
        Comparator::Ne,
    ];

    /// Absolute tolerance for `=` and `!=`
    pub const EQ_TOLERANCE: f64 = 1e-9;

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            ">" => Some(Comparator::Gt),
            "<" => Some(Comparator::Lt),
            ">=" | "≥" => Some(Comparator::Ge),
            "<=" | "≤" => Some(Comparator::Le),
            "==" | "=" => Some(Comparator::Eq),
            "!=" | "≠" | "<>" => Some(Comparator::Ne),
            _ => None,
        }
    }

    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            Comparator::Gt => a > b,
            Comparator::Lt => a < b,
            Comparator::Ge => a >= b,
            Comparator::Le => a <= b,
            Comparator::Eq => a == b || (a - b).abs() <= Self::EQ_TOLERANCE,
            Comparator::Ne => !(a == b || (a - b).abs() <= Self::EQ_TOLERANCE),
        }
    }
}

/// Price/volume series a variable node reads from the current bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    Open,
    High,
    Low,
    Close,
    Volume,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl Variable {
    pub const ALL: [Variable; 8] = [
        Variable::Open,
        Variable::High,
        Variable::Low,
        Variable::Close,
        Variable::Volume,
        Variable::Hl2,
        Variable::Hlc3,
        Variable::Ohlc4,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variable::Open => "open",
            Variable::High => "high",
            Variable::Low => "low",
            Variable::Close => "close",
            Variable::Volume => "volume",
            Variable::Hl2 => "hl2",
            Variable::Hlc3 => "hlc3",
            Variable::Ohlc4 => "ohlc4",
        }
    }

    pub fn value(self, bar: &Bar) -> f64 {
        match self {
            Variable::Open => bar.open,
            Variable::High => bar.high,
            Variable::Low => bar.low,
            Variable::Close => bar.close,
            Variable::Volume => bar.volume,
            Variable::Hl2 => (bar.high + bar.low) / 2.0,
            Variable::Hlc3 => (bar.high + bar.low + bar.close) / 3.0,
            Variable::Ohlc4 => (bar.open + bar.high + bar.low + bar.close) / 4.0,
        }
    }
}

impl FromStr for Variable {
    type Err = TradegeneError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Variable::ALL
            .into_iter()
            .find(|v| v.name() == lower)
            .ok_or_else(|| TradegeneError::InvalidVariable(s.to_string()))
    }
}

/// The five closed node kinds, as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Operator,
    Comparator,
    Indicator,
    Constant,
    Variable,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Operator,
        NodeType::Comparator,
        NodeType::Indicator,
        NodeType::Constant,
        NodeType::Variable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Operator => "operator",
            NodeType::Comparator => "comparator",
            NodeType::Indicator => "indicator",
            NodeType::Constant => "constant",
            NodeType::Variable => "variable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        NodeType::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Kind-specific payload of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Operator(Operator),
    Comparator(Comparator),
    Indicator { name: String, params: Params },
    Constant(f64),
    Variable(Variable),
}

impl NodeKind {
    pub fn arity(&self) -> usize {
        match self {
            NodeKind::Operator(op) => op.arity(),
            NodeKind::Comparator(_) => 2,
            NodeKind::Indicator { .. } | NodeKind::Constant(_) | NodeKind::Variable(_) => 0,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Operator(_) => NodeType::Operator,
            NodeKind::Comparator(_) => NodeType::Comparator,
            NodeKind::Indicator { .. } => NodeType::Indicator,
            NodeKind::Constant(_) => NodeType::Constant,
            NodeKind::Variable(_) => NodeType::Variable,
        }
    }

    /// True for node kinds that always evaluate to a boolean
    pub fn is_boolean(&self) -> bool {
        match self {
            NodeKind::Operator(op) => op.family() == OperatorFamily::Boolean,
            NodeKind::Comparator(_) => true,
            _ => false,
        }
    }
}

/// One AST element. Fields are private so that every node in existence has
/// exactly `kind.arity()` children.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeKind,
    children: Vec<Node>,
}

impl Node {
    /// Checked constructor for any kind
    pub fn new(kind: NodeKind, children: Vec<Node>) -> Result<Self> {
        let kind = match kind {
            NodeKind::Indicator { name, params } => {
                let indicator = indicators::lookup(&name)
                    .ok_or_else(|| TradegeneError::UnknownIndicator(name.clone()))?;
                NodeKind::Indicator {
                    name: indicator.alias().to_string(),
                    params,
                }
            }
            other => other,
        };

        if children.len() != kind.arity() {
            return Err(TradegeneError::InvalidArity {
                node: describe_kind(&kind),
                expected: kind.arity(),
                actual: children.len(),
            });
        }

        Ok(Self { kind, children })
    }

    pub fn operator(op: Operator, children: Vec<Node>) -> Result<Self> {
        Self::new(NodeKind::Operator(op), children)
    }

    pub fn and(left: Node, right: Node) -> Self {
        Self::from_parts(NodeKind::Operator(Operator::And), vec![left, right])
    }

    pub fn or(left: Node, right: Node) -> Self {
        Self::from_parts(NodeKind::Operator(Operator::Or), vec![left, right])
    }

    pub fn not(child: Node) -> Self {
        Self::from_parts(NodeKind::Operator(Operator::Not), vec![child])
    }

    pub fn compare(cmp: Comparator, left: Node, right: Node) -> Self {
        Self::from_parts(NodeKind::Comparator(cmp), vec![left, right])
    }

    pub fn indicator(name: &str, params: Params) -> Result<Self> {
        Self::new(
            NodeKind::Indicator {
                name: name.to_string(),
                params,
            },
            Vec::new(),
        )
    }

    /// Indicator with its declared default parameters
    pub fn indicator_default(name: &str) -> Result<Self> {
        let indicator = indicators::lookup(name)
            .ok_or_else(|| TradegeneError::UnknownIndicator(name.to_string()))?;
        Self::indicator(indicator.alias(), indicators::default_params(indicator))
    }

    pub fn constant(value: f64) -> Self {
        Self {
            kind: NodeKind::Constant(value),
            children: Vec::new(),
        }
    }

    pub fn variable(var: Variable) -> Self {
        Self {
            kind: NodeKind::Variable(var),
            children: Vec::new(),
        }
    }

    pub fn variable_named(name: &str) -> Result<Self> {
        Ok(Self::variable(name.parse()?))
    }

    /// Unchecked constructor for callers that build `children` from
    /// `kind.arity()` themselves.
    pub(crate) fn from_parts(kind: NodeKind, children: Vec<Node>) -> Self {
        debug_assert_eq!(kind.arity(), children.len());
        Self { kind, children }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn arity(&self) -> usize {
        self.kind.arity()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Rebuild this node with a different kind, keeping the children.
    pub fn with_kind(&self, kind: NodeKind) -> Result<Self> {
        Self::new(kind, self.children.clone())
    }

    /// Rebuild this node with its children in reverse order.
    pub fn reversed(&self) -> Self {
        let mut children = self.children.clone();
        children.reverse();
        Self {
            kind: self.kind.clone(),
            children,
        }
    }

    pub fn evaluate(&self, ctx: &MarketContext) -> Value {
        evaluator::evaluate(self, ctx)
    }

    /// Depth of the tree rooted here; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Node::depth).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// Nodes in preorder
    pub fn preorder(&self) -> Vec<&Node> {
        let mut out = Vec::with_capacity(self.node_count());
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Paths of every node in preorder; the first entry is the root.
    pub fn paths(&self) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodePath, &Node)> = vec![(Vec::new(), self)];
        while let Some((path, node)) = stack.pop() {
            for (i, child) in node.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child_path, child));
            }
            out.push(path);
        }
        out
    }

    pub fn get(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, &i| node.children.get(i))
    }

    /// Swap the node at `path` for `replacement`, returning the old subtree.
    /// Replacing the root (empty path) replaces `self`.
    pub fn replace_at(&mut self, path: &[usize], replacement: Node) -> Option<Node> {
        let mut node = self;
        for &i in path {
            node = node.children.get_mut(i)?;
        }
        Some(std::mem::replace(node, replacement))
    }

    /// Rendered formula text
    pub fn to_formula(&self) -> String {
        self.to_string()
    }

    fn fmt_child(&self, child: &Node, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wrap = match (&self.kind, &child.kind) {
            (_, NodeKind::Operator(_)) => true,
            (NodeKind::Comparator(_), NodeKind::Comparator(_)) => true,
            _ => false,
        };
        if wrap {
            write!(f, "({})", child)
        } else {
            write!(f, "{}", child)
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Operator(Operator::Not) => {
                write!(f, "NOT ")?;
                self.fmt_child(&self.children[0], f)
            }
            NodeKind::Operator(op) => {
                self.fmt_child(&self.children[0], f)?;
                write!(f, " {} ", op.symbol())?;
                self.fmt_child(&self.children[1], f)
            }
            NodeKind::Comparator(cmp) => {
                self.fmt_child(&self.children[0], f)?;
                write!(f, " {} ", cmp.symbol())?;
                self.fmt_child(&self.children[1], f)
            }
            NodeKind::Indicator { name, params } => {
                write!(f, "{}", indicators::formula_text(name, params))
            }
            NodeKind::Constant(v) => write!(f, "{}", format_number(*v)),
            NodeKind::Variable(v) => write!(f, "{}", v.name()),
        }
    }
}

fn describe_kind(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Operator(op) => format!("operator {}", op.symbol()),
        NodeKind::Comparator(cmp) => format!("comparator {}", cmp.symbol()),
        NodeKind::Indicator { name, .. } => format!("indicator {}", name),
        NodeKind::Constant(v) => format!("constant {}", v),
        NodeKind::Variable(v) => format!("variable {}", v.name()),
    }
}

/// How a gene came to be
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    #[serde(default)]
    pub parent_ids: Vec<String>,
    #[serde(default)]
    pub mutation_type: Option<String>,
}

impl Lineage {
    pub fn from_parents(parent_ids: Vec<String>) -> Self {
        Self {
            parent_ids,
            mutation_type: None,
        }
    }

    /// Append a variation to the mutation history, e.g. `crossover+inversion`.
    pub fn record(&mut self, mutation_type: &str) {
        self.mutation_type = Some(match self.mutation_type.take() {
            Some(prev) => format!("{}+{}", prev, mutation_type),
            None => mutation_type.to_string(),
        });
    }
}

/// One genotype: an owned tree plus identity and ancestry
#[derive(Debug, Clone, PartialEq)]
pub struct GeneExpression {
    root: Node,
    pub gene_id: String,
    pub generation: usize,
    pub lineage: Lineage,
}

impl GeneExpression {
    pub fn new(root: Node, gene_id: impl Into<String>) -> Self {
        Self {
            root,
            gene_id: gene_id.into(),
            generation: 0,
            lineage: Lineage::default(),
        }
    }

    pub fn with_random_id<R: Rng>(root: Node, rng: &mut R) -> Self {
        Self::new(root, random_gene_id(rng))
    }

    /// A fresh individual for `generation` built from `root`, descending
    /// from `parents`.
    pub fn offspring<R: Rng>(
        root: Node,
        parents: &[&GeneExpression],
        generation: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            root,
            gene_id: random_gene_id(rng),
            generation,
            lineage: Lineage::from_parents(parents.iter().map(|p| p.gene_id.clone()).collect()),
        }
    }

    pub fn with_generation(mut self, generation: usize) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_lineage(mut self, lineage: Lineage) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Same identity and ancestry, different tree.
    pub fn with_root(&self, root: Node) -> Self {
        Self {
            root,
            gene_id: self.gene_id.clone(),
            generation: self.generation,
            lineage: self.lineage.clone(),
        }
    }

    pub fn evaluate(&self, ctx: &MarketContext) -> Value {
        self.root.evaluate(ctx)
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    pub fn formula(&self) -> String {
        self.root.to_formula()
    }
}

impl fmt::Display for GeneExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.gene_id, self.root)
    }
}

pub fn random_gene_id<R: Rng>(rng: &mut R) -> String {
    format!("{:016x}", rng.gen::<u64>())
}

pub fn is_valid_gene_id(id: &str) -> bool {
    id.len() == GENE_ID_LEN && id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsi_lt_30() -> Node {
        let mut params = Params::new();
        params.insert("period".to_string(), 14.0);
        Node::compare(
            Comparator::Lt,
            Node::indicator("rsi", params).unwrap(),
            Node::constant(30.0),
        )
    }

    #[test]
    fn test_paths_are_preorder() {
        let tree = Node::and(rsi_lt_30(), Node::variable(Variable::Close));
        let paths = tree.paths();
        assert_eq!(paths, vec![vec![], vec![0], vec![0, 0], vec![0, 1], vec![1]]);
        let kinds: Vec<NodeType> = tree.preorder().iter().map(|n| n.node_type()).collect();
        let via_paths: Vec<NodeType> = paths
            .iter()
            .map(|p| tree.get(p).unwrap().node_type())
            .collect();
        assert_eq!(kinds, via_paths);
    }

    #[test]
    fn test_replace_at_returns_old_subtree() {
        let mut tree = rsi_lt_30();
        let old = tree.replace_at(&[1], Node::constant(70.0)).unwrap();
        assert_eq!(old, Node::constant(30.0));
        assert_eq!(tree.to_formula(), "RSI(14) < 70");
        assert!(tree.replace_at(&[5], Node::constant(1.0)).is_none());
    }

    #[test]
    fn test_indicator_name_is_canonicalised() {
        let node = rsi_lt_30();
        match node.children()[0].kind() {
            NodeKind::Indicator { name, .. } => assert_eq!(name, "RSI"),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_lineage_record_joins() {
        let mut lineage = Lineage::default();
        lineage.record("crossover");
        lineage.record("inversion");
        assert_eq!(lineage.mutation_type.as_deref(), Some("crossover+inversion"));
    }

    #[test]
    fn test_gene_id_format() {
        assert!(is_valid_gene_id("0123456789abcdef"));
        assert!(!is_valid_gene_id("0123456789abcdeg"));
        assert!(!is_valid_gene_id("0123456789ABCDEF"));
        assert!(!is_valid_gene_id("abc"));
    }
}
