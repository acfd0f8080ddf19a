//! Structural variation and selection operators.
//!
//! Every operator reads its input by reference and builds a new owned tree,
//! so individuals of the previous generation are never touched. Operators
//! whose preconditions fail return `None` (node level) or an unmodified
//! clone (gene level) instead of an error.

use crate::config::EvolutionConfig;
use crate::engines::generation::ast::{
    Comparator, GeneExpression, Node, NodeKind, NodePath, Operator, Variable,
};
use crate::engines::generation::evolution_engine::ScoredGene;
use crate::engines::generation::tree_generator::RandomTreeGenerator;
use crate::functions::indicators::{self, Params};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariationKind {
    PointMutation,
    SubtreeMutation,
    Crossover,
    IsTransposition,
    RisTransposition,
    Inversion,
}

impl VariationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VariationKind::PointMutation => "point_mutation",
            VariationKind::SubtreeMutation => "subtree_mutation",
            VariationKind::Crossover => "crossover",
            VariationKind::IsTransposition => "is_transposition",
            VariationKind::RisTransposition => "ris_transposition",
            VariationKind::Inversion => "inversion",
        }
    }
}

fn within_bounds(tree: &Node, config: &EvolutionConfig) -> bool {
    tree.node_count() <= config.max_nodes && tree.depth() <= config.max_depth
}

fn pick<'a, T, R: Rng>(items: &'a [T], rng: &mut R) -> Option<&'a T> {
    items.choose(rng)
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Replace one uniformly chosen node (root included) with a same-family
/// variant. Always succeeds.
pub fn point_mutation<R: Rng>(root: &Node, config: &EvolutionConfig, rng: &mut R) -> Node {
    let paths = root.paths();
    let Some(path) = pick(&paths, rng) else {
        return root.clone();
    };
    let Some(target) = root.get(path) else {
        return root.clone();
    };

    let replacement = mutate_node(target, config, rng);
    let mut out = root.clone();
    out.replace_at(path, replacement);
    out
}

/// Clamp into `[constant_min, constant_max]`. An inverted range from an
/// unvalidated config leaves the value as is.
fn clamp_constant(value: f64, config: &EvolutionConfig) -> f64 {
    if config.constant_min <= config.constant_max {
        value.clamp(config.constant_min, config.constant_max)
    } else {
        value
    }
}

fn mutate_node<R: Rng>(node: &Node, config: &EvolutionConfig, rng: &mut R) -> Node {
    match node.kind() {
        NodeKind::Constant(v) => {
            let sigma = (v.abs() * 0.1).max(1.0);
            let delta = Normal::new(0.0, sigma)
                .map(|normal| normal.sample(rng))
                .unwrap_or(0.0);
            Node::constant(clamp_constant(v + delta, config))
        }
        NodeKind::Variable(var) => {
            let others: Vec<Variable> = Variable::ALL.into_iter().filter(|v| v != var).collect();
            Node::variable(*pick(&others, rng).unwrap_or(var))
        }
        NodeKind::Indicator { name, params } => mutate_indicator(node, name, params, rng),
        NodeKind::Operator(op) => {
            let siblings: Vec<Operator> = op.siblings().collect();
            match pick(&siblings, rng) {
                Some(new_op) => Node::from_parts(NodeKind::Operator(*new_op), node.children().to_vec()),
                None => node.clone(),
            }
        }
        NodeKind::Comparator(cmp) => {
            let others: Vec<Comparator> = Comparator::ALL.into_iter().filter(|c| c != cmp).collect();
            let new_cmp = *pick(&others, rng).unwrap_or(cmp);
            Node::from_parts(NodeKind::Comparator(new_cmp), node.children().to_vec())
        }
    }
}

fn mutate_indicator<R: Rng>(node: &Node, name: &str, params: &Params, rng: &mut R) -> Node {
    let Some(indicator) = indicators::lookup(name) else {
        return node.clone();
    };

    let specs = indicator.params();
    if !specs.is_empty() && rng.gen_bool(0.5) {
        // Perturb one parameter by up to +/-20%
        let Some(spec) = pick(specs, rng) else {
            return node.clone();
        };
        let current = indicators::param(params, spec);
        let factor = rng.gen_range(0.8..=1.2);
        let mut new_params = params.clone();
        new_params.insert(spec.name.to_string(), spec.normalize(current * factor));
        return Node::from_parts(
            NodeKind::Indicator {
                name: indicator.alias().to_string(),
                params: new_params,
            },
            Vec::new(),
        );
    }

    // Swap identity, keeping parameters the new indicator shares
    let others: Vec<_> = indicators::all()
        .iter()
        .copied()
        .filter(|other| other.alias() != indicator.alias())
        .collect();
    let Some(other) = pick(&others, rng) else {
        return node.clone();
    };
    let new_params: Params = other
        .params()
        .iter()
        .map(|spec| {
            let value = params
                .get(spec.name)
                .map(|v| spec.normalize(*v))
                .unwrap_or(spec.default);
            (spec.name.to_string(), value)
        })
        .collect();
    Node::from_parts(
        NodeKind::Indicator {
            name: other.alias().to_string(),
            params: new_params,
        },
        Vec::new(),
    )
}

/// Replace a random non-root subtree with a fresh random tree that fits the
/// remaining depth budget. `None` when the tree is a single node or the
/// result would exceed `max_nodes`.
pub fn subtree_mutation<R: Rng>(
    root: &Node,
    config: &EvolutionConfig,
    generator: &RandomTreeGenerator,
    rng: &mut R,
) -> Option<Node> {
    let paths = root.paths();
    let path = pick(&paths[1..], rng)?;

    // The root sits at level 1
    let level = path.len() + 1;
    let budget = (config.max_depth + 1).saturating_sub(level).max(1);
    let replacement = generator.generate_with_budget(budget, rng);

    let mut out = root.clone();
    out.replace_at(path, replacement)?;
    if out.node_count() > config.max_nodes {
        log::trace!("Subtree mutation rejected: {} nodes", out.node_count());
        return None;
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Crossover
// ---------------------------------------------------------------------------

/// Swap one uniformly chosen non-root subtree between two parents.
/// `None` if either parent is a single node or either child would exceed
/// `max_nodes` or `max_depth`.
pub fn crossover<R: Rng>(
    a: &Node,
    b: &Node,
    config: &EvolutionConfig,
    rng: &mut R,
) -> Option<(Node, Node)> {
    let paths_a = a.paths();
    let paths_b = b.paths();
    let path_a = pick(&paths_a[1..], rng)?;
    let path_b = pick(&paths_b[1..], rng)?;

    let sub_a = a.get(path_a)?.clone();
    let sub_b = b.get(path_b)?.clone();

    let mut child_a = a.clone();
    let mut child_b = b.clone();
    child_a.replace_at(path_a, sub_b)?;
    child_b.replace_at(path_b, sub_a)?;

    if !within_bounds(&child_a, config) || !within_bounds(&child_b, config) {
        log::trace!(
            "Crossover rejected: children of {} and {} nodes",
            child_a.node_count(),
            child_b.node_count()
        );
        return None;
    }
    Some((child_a, child_b))
}

// ---------------------------------------------------------------------------
// Transposition and inversion
// ---------------------------------------------------------------------------

/// IS transposition: copy a random non-root subtree into a child slot of a
/// different function node, displacing that slot's previous subtree.
///
/// The subtree's own slot is never a target, and a copy that leaves the
/// tree unchanged is reported as `None`.
pub fn is_transposition<R: Rng>(root: &Node, config: &EvolutionConfig, rng: &mut R) -> Option<Node> {
    let paths = root.paths();
    let source_path = pick(&paths[1..], rng)?;
    let source = root.get(source_path)?.clone();

    let slots: Vec<NodePath> = paths
        .iter()
        .filter(|p| *p != source_path)
        .filter_map(|p| root.get(p).map(|n| (p, n.arity())))
        .flat_map(|(p, arity)| {
            (0..arity).map(move |i| {
                let mut slot = p.clone();
                slot.push(i);
                slot
            })
        })
        .filter(|slot| slot != source_path)
        .collect();
    let slot_path = pick(&slots, rng)?;

    let mut out = root.clone();
    out.replace_at(slot_path, source)?;
    (out != *root && within_bounds(&out, config)).then_some(out)
}

/// RIS transposition: a copy of a random non-root subtree becomes the
/// sibling of the current root under a fresh AND/OR root.
pub fn ris_transposition<R: Rng>(root: &Node, config: &EvolutionConfig, rng: &mut R) -> Option<Node> {
    let paths = root.paths();
    let path = pick(&paths[1..], rng)?;
    let lifted = root.get(path)?.clone();

    let out = if rng.gen_bool(0.5) {
        Node::and(root.clone(), lifted)
    } else {
        Node::or(root.clone(), lifted)
    };
    within_bounds(&out, config).then_some(out)
}

/// Reverse the children of a random operator node with two or more
/// children.
pub fn inversion<R: Rng>(root: &Node, rng: &mut R) -> Option<Node> {
    let candidates: Vec<NodePath> = root
        .paths()
        .into_iter()
        .filter(|p| {
            root.get(p)
                .map(|n| matches!(n.kind(), NodeKind::Operator(_)) && n.children().len() >= 2)
                .unwrap_or(false)
        })
        .collect();
    let path = pick(&candidates, rng)?;
    let reversed = root.get(path)?.reversed();

    let mut out = root.clone();
    out.replace_at(path, reversed)?;
    (out != *root).then_some(out)
}

// ---------------------------------------------------------------------------
// Composite variation
// ---------------------------------------------------------------------------

/// Applies the mutation-type operators with their configured probabilities.
pub struct Variator<'a> {
    config: &'a EvolutionConfig,
    generator: &'a RandomTreeGenerator,
}

impl<'a> Variator<'a> {
    pub fn new(config: &'a EvolutionConfig, generator: &'a RandomTreeGenerator) -> Self {
        Self { config, generator }
    }

    /// Run point mutation, subtree mutation, IS, RIS and inversion in that
    /// order, each with its own probability. Returns the new tree and the
    /// operators that actually changed it.
    pub fn mutate<R: Rng>(&self, root: &Node, rng: &mut R) -> (Node, Vec<VariationKind>) {
        let mut tree = root.clone();
        let mut applied = Vec::new();

        if rng.gen::<f64>() < self.config.mutation_rate {
            let mutated = point_mutation(&tree, self.config, rng);
            if mutated != tree {
                tree = mutated;
                applied.push(VariationKind::PointMutation);
            }
        }
        if rng.gen::<f64>() < self.config.subtree_mutation_rate {
            if let Some(t) = subtree_mutation(&tree, self.config, self.generator, rng) {
                tree = t;
                applied.push(VariationKind::SubtreeMutation);
            }
        }
        if rng.gen::<f64>() < self.config.is_transposition_rate {
            if let Some(t) = is_transposition(&tree, self.config, rng) {
                tree = t;
                applied.push(VariationKind::IsTransposition);
            }
        }
        if rng.gen::<f64>() < self.config.ris_transposition_rate {
            if let Some(t) = ris_transposition(&tree, self.config, rng) {
                tree = t;
                applied.push(VariationKind::RisTransposition);
            }
        }
        if rng.gen::<f64>() < self.config.inversion_rate {
            if let Some(t) = inversion(&tree, rng) {
                tree = t;
                applied.push(VariationKind::Inversion);
            }
        }

        (tree, applied)
    }

    /// Mutated offspring of `gene` with a fresh id for `generation`.
    pub fn mutate_gene<R: Rng>(
        &self,
        gene: &GeneExpression,
        generation: usize,
        rng: &mut R,
    ) -> GeneExpression {
        let (root, applied) = self.mutate(gene.root(), rng);
        let mut child = GeneExpression::offspring(root, &[gene], generation, rng);
        for kind in applied {
            child.lineage.record(kind.as_str());
        }
        child
    }

    /// Apply the mutation operators to an already-built child in place of
    /// its tree, extending its lineage.
    pub fn mutate_child<R: Rng>(&self, child: GeneExpression, rng: &mut R) -> GeneExpression {
        let (root, applied) = self.mutate(child.root(), rng);
        let mut out = child.with_root(root);
        for kind in applied {
            out.lineage.record(kind.as_str());
        }
        out
    }
}

/// Crossover at gene level: two offspring with fresh ids descending from
/// both parents. When the swap is rejected the offspring carry unmodified
/// copies of the parents' trees.
pub fn crossover_genes<R: Rng>(
    a: &GeneExpression,
    b: &GeneExpression,
    generation: usize,
    config: &EvolutionConfig,
    rng: &mut R,
) -> (GeneExpression, GeneExpression) {
    let swapped = crossover(a.root(), b.root(), config, rng);
    let applied = swapped.is_some();
    let (root_a, root_b) = swapped.unwrap_or_else(|| (a.root().clone(), b.root().clone()));

    let mut child_a = GeneExpression::offspring(root_a, &[a, b], generation, rng);
    let mut child_b = GeneExpression::offspring(root_b, &[b, a], generation, rng);
    if applied {
        child_a.lineage.record(VariationKind::Crossover.as_str());
        child_b.lineage.record(VariationKind::Crossover.as_str());
    }
    (child_a, child_b)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// NaN sorts below every real fitness.
pub(crate) fn rank_key(fitness: f64) -> f64 {
    if fitness.is_nan() {
        f64::NEG_INFINITY
    } else {
        fitness
    }
}

/// Tournament selection: pick best of K random candidates (with replacement)
pub fn tournament_selection<'p, R: Rng>(
    population: &'p [ScoredGene],
    tournament_size: usize,
    rng: &mut R,
) -> Option<&'p ScoredGene> {
    if population.is_empty() {
        return None;
    }

    let mut best = &population[rng.gen_range(0..population.len())];
    for _ in 1..tournament_size.max(1) {
        let candidate = &population[rng.gen_range(0..population.len())];
        if rank_key(candidate.fitness) > rank_key(best.fitness) {
            best = candidate;
        }
    }
    Some(best)
}

/// Roulette wheel selection: probability proportional to fitness.
/// Negative and non-finite fitness counts as zero; a zero total falls back
/// to a uniform pick.
pub fn roulette_selection<'p, R: Rng>(
    population: &'p [ScoredGene],
    rng: &mut R,
) -> Option<&'p ScoredGene> {
    if population.is_empty() {
        return None;
    }

    let weight = |f: f64| if f.is_finite() { f.max(0.0) } else { 0.0 };
    let total_fitness: f64 = population.iter().map(|s| weight(s.fitness)).sum();

    if total_fitness <= 0.0 {
        return Some(&population[rng.gen_range(0..population.len())]);
    }

    let mut spin = rng.gen::<f64>() * total_fitness;
    for scored in population {
        let w = weight(scored.fitness);
        if w <= 0.0 {
            continue;
        }
        spin -= w;
        if spin <= 0.0 {
            return Some(scored);
        }
    }

    // Float residue: last individual with positive weight
    population.iter().rev().find(|s| weight(s.fitness) > 0.0)
}

/// Elitism: clones of the top `count` individuals by fitness, best first.
/// Ties keep population order.
pub fn elitism(population: &[ScoredGene], count: usize) -> Vec<GeneExpression> {
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&i, &j| {
        rank_key(population[j].fitness).total_cmp(&rank_key(population[i].fitness))
    });
    order
        .into_iter()
        .take(count)
        .map(|i| population[i].gene.clone())
        .collect()
}
