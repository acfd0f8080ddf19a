use crate::engines::generation::ast::{Node, NodeType};

/// Structural distance between two trees in [0, 1].
///
/// Both trees are flattened to their preorder node-type sequences; the
/// distance is one minus the fraction of aligned positions whose types
/// match, measured against the longer sequence.
pub fn structural_distance(a: &Node, b: &Node) -> f64 {
    distance(&type_sequence(a), &type_sequence(b))
}

/// Mean pairwise structural distance over a population. O(n²) in the
/// population size; fewer than two trees yields 0.
pub fn population_diversity<'a, I>(trees: I) -> f64
where
    I: IntoIterator<Item = &'a Node>,
{
    let sequences: Vec<Vec<NodeType>> = trees.into_iter().map(type_sequence).collect();
    let n = sequences.len();
    if n < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            total += distance(&sequences[i], &sequences[j]);
        }
    }
    total / (n * (n - 1) / 2) as f64
}

fn type_sequence(node: &Node) -> Vec<NodeType> {
    node.preorder().into_iter().map(Node::node_type).collect()
}

fn distance(a: &[NodeType], b: &[NodeType]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let matching = a.iter().zip(b).filter(|(x, y)| x == y).count();
    1.0 - matching as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::ast::{Comparator, Variable};

    #[test]
    fn test_identical_population_has_zero_diversity() {
        let tree = Node::compare(Comparator::Gt, Node::variable(Variable::Close), Node::constant(1.0));
        let population = vec![tree.clone(), tree.clone(), tree];
        assert_eq!(population_diversity(&population), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric_and_bounded() {
        let a = Node::compare(Comparator::Gt, Node::variable(Variable::Close), Node::constant(1.0));
        let b = Node::constant(3.0);

        let d = structural_distance(&a, &b);
        assert_eq!(d, structural_distance(&b, &a));
        assert!((0.0..=1.0).contains(&d));
        // Aligned: comparator vs constant, nothing else overlaps
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_tree_has_zero_diversity() {
        assert_eq!(population_diversity([&Node::constant(1.0)]), 0.0);
    }
}
