use crate::engines::generation::ast::GeneExpression;
use crate::engines::generation::evolution_engine::ScoredGene;
use crate::engines::generation::operators::rank_key;

use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct EliteGene {
    pub gene: GeneExpression,
    pub fitness: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub canonical_string: String, // For deduplication
    pub generation_found: usize,
}

/// Best distinct individuals seen across a run, sorted by fitness
/// (descending) and capped at `max_size`.
pub struct HallOfFame {
    genes: Vec<EliteGene>,
    max_size: usize,
    seen_signatures: HashSet<String>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            genes: Vec::new(),
            max_size,
            seen_signatures: HashSet::new(),
        }
    }

    /// Attempt to add an individual. Structural duplicates of an entry
    /// already held are rejected.
    pub fn try_add(&mut self, elite: EliteGene) -> bool {
        if self.max_size == 0 || self.seen_signatures.contains(&elite.canonical_string) {
            return false;
        }

        self.seen_signatures.insert(elite.canonical_string.clone());
        self.genes.push(elite);
        self.sort_and_trim();
        true
    }

    /// Offer every individual of an evaluated generation
    pub fn update(&mut self, scored: &[ScoredGene], generation: usize) -> usize {
        let mut added = 0;
        for s in scored {
            let elite = EliteGene {
                gene: s.gene.clone(),
                fitness: s.fitness,
                metadata: s.metadata.clone(),
                canonical_string: canonical_string(&s.gene),
                generation_found: generation,
            };
            if self.try_add(elite) {
                added += 1;
            }
        }
        added
    }

    fn sort_and_trim(&mut self) {
        self.genes
            .sort_by(|a, b| rank_key(b.fitness).total_cmp(&rank_key(a.fitness)));

        while self.genes.len() > self.max_size {
            if let Some(removed) = self.genes.pop() {
                self.seen_signatures.remove(&removed.canonical_string);
            }
        }
    }

    pub fn best(&self) -> Option<&EliteGene> {
        self.genes.first()
    }

    pub fn get_all(&self) -> &[EliteGene] {
        &self.genes
    }

    pub fn get_top_n(&self, n: usize) -> &[EliteGene] {
        &self.genes[..n.min(self.genes.len())]
    }

    pub fn filter_by_threshold(&self, min_fitness: f64) -> Vec<EliteGene> {
        self.genes
            .iter()
            .filter(|g| g.fitness >= min_fitness)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// Deduplication key: the rendered formula, which is identical for
/// structurally equal trees.
pub fn canonical_string(gene: &GeneExpression) -> String {
    gene.formula()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::ast::{Comparator, Node, Variable};
    use crate::types::FitnessResult;

    fn scored(threshold: f64, fitness: f64) -> ScoredGene {
        let root = Node::compare(Comparator::Gt, Node::variable(Variable::Close), Node::constant(threshold));
        ScoredGene::new(GeneExpression::new(root, "00000000000000aa"), FitnessResult::new(fitness))
    }

    #[test]
    fn test_dedup_and_ordering() {
        let mut hof = HallOfFame::new(2);
        let added = hof.update(&[scored(1.0, 0.2), scored(1.0, 0.9), scored(2.0, 0.5), scored(3.0, 0.7)], 0);

        assert_eq!(added, 3);
        assert_eq!(hof.len(), 2);
        assert_eq!(hof.best().map(|e| e.fitness), Some(0.7));
        assert_eq!(hof.get_top_n(5).len(), 2);
    }

    #[test]
    fn test_trimmed_entry_can_return() {
        let mut hof = HallOfFame::new(1);
        hof.update(&[scored(1.0, 0.1)], 0);
        hof.update(&[scored(2.0, 0.5)], 1);
        assert_eq!(hof.best().map(|e| e.generation_found), Some(1));
        assert_eq!(hof.filter_by_threshold(0.4).len(), 1);
    }
}
