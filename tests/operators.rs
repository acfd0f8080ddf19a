use rand::rngs::StdRng;
use rand::SeedableRng;
use tradegene::config::EvolutionConfig;
use tradegene::engines::generation::ast::{Comparator, GeneExpression, Node, NodeKind, Operator, Variable};
use tradegene::engines::generation::evolution_engine::ScoredGene;
use tradegene::engines::generation::operators::{
    crossover, crossover_genes, elitism, inversion, is_transposition, point_mutation,
    ris_transposition, roulette_selection, subtree_mutation, tournament_selection, Variator,
};
use tradegene::engines::generation::parser::parse_formula;
use tradegene::engines::generation::tree_generator::RandomTreeGenerator;
use tradegene::protocol;
use tradegene::types::FitnessResult;

fn arity_holds(node: &Node) -> bool {
    node.children().len() == node.arity() && node.children().iter().all(arity_holds)
}

fn config() -> EvolutionConfig {
    EvolutionConfig {
        max_depth: 6,
        max_nodes: 30,
        ..Default::default()
    }
}

fn sample_trees(rng: &mut StdRng, n: usize) -> Vec<Node> {
    let generator = RandomTreeGenerator::new(5);
    (0..n).map(|_| generator.generate_signal(rng)).collect()
}

fn scored(formula: &str, fitness: f64, id: &str) -> ScoredGene {
    ScoredGene::new(
        GeneExpression::new(parse_formula(formula).unwrap(), id),
        FitnessResult::new(fitness),
    )
}

#[test]
fn test_operators_never_touch_their_input() {
    let mut rng = StdRng::seed_from_u64(1);
    let config = config();
    let generator = RandomTreeGenerator::from_config(&config);

    for tree in sample_trees(&mut rng, 100) {
        let gene = GeneExpression::new(tree.clone(), "0000000000000001");
        let before = serde_json::to_string(&protocol::serialize(&gene, None, None).ast).unwrap();

        let _ = point_mutation(gene.root(), &config, &mut rng);
        let _ = subtree_mutation(gene.root(), &config, &generator, &mut rng);
        let _ = is_transposition(gene.root(), &config, &mut rng);
        let _ = ris_transposition(gene.root(), &config, &mut rng);
        let _ = inversion(gene.root(), &mut rng);
        let _ = crossover(gene.root(), &tree, &config, &mut rng);
        let _ = Variator::new(&config, &generator).mutate_gene(&gene, 1, &mut rng);

        let after = serde_json::to_string(&protocol::serialize(&gene, None, None).ast).unwrap();
        assert_eq!(before, after);
        assert_eq!(gene.root(), &tree);
    }
}

#[test]
fn test_every_operator_preserves_arity() {
    let mut rng = StdRng::seed_from_u64(2);
    let config = config();
    let generator = RandomTreeGenerator::from_config(&config);
    let trees = sample_trees(&mut rng, 120);

    for pair in trees.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(arity_holds(a));

        assert!(arity_holds(&point_mutation(a, &config, &mut rng)));
        for result in [
            subtree_mutation(a, &config, &generator, &mut rng),
            is_transposition(a, &config, &mut rng),
            ris_transposition(a, &config, &mut rng),
            inversion(a, &mut rng),
        ]
        .into_iter()
        .flatten()
        {
            assert!(arity_holds(&result));
        }
        if let Some((x, y)) = crossover(a, b, &config, &mut rng) {
            assert!(arity_holds(&x));
            assert!(arity_holds(&y));
        }
    }
}

#[test]
fn test_crossover_respects_bounds() {
    let mut rng = StdRng::seed_from_u64(3);
    let config = EvolutionConfig {
        max_nodes: 12,
        max_depth: 5,
        ..Default::default()
    };
    let trees = sample_trees(&mut rng, 200);

    let mut accepted = 0;
    for pair in trees.windows(2) {
        if let Some((x, y)) = crossover(&pair[0], &pair[1], &config, &mut rng) {
            accepted += 1;
            assert!(x.node_count() <= config.max_nodes && y.node_count() <= config.max_nodes);
            assert!(x.depth() <= config.max_depth && y.depth() <= config.max_depth);
        }
    }
    assert!(accepted > 0);
}

#[test]
fn test_rejected_crossover_returns_parent_copies() {
    let mut rng = StdRng::seed_from_u64(4);
    let config = EvolutionConfig {
        max_nodes: 3,
        ..Default::default()
    };
    let a = GeneExpression::new(parse_formula("close > 1 AND open < 2").unwrap(), "000000000000000a");
    let b = GeneExpression::new(parse_formula("high > 3 OR low < 4").unwrap(), "000000000000000b");

    let (x, y) = crossover_genes(&a, &b, 1, &config, &mut rng);
    assert_eq!(x.root(), a.root());
    assert_eq!(y.root(), b.root());
    assert_eq!(x.lineage.parent_ids, vec![a.gene_id.clone(), b.gene_id.clone()]);
    assert_eq!(x.lineage.mutation_type, None);
    assert_ne!(x.gene_id, a.gene_id);
    assert_eq!(x.generation, 1);
}

#[test]
fn test_leaf_only_trees_are_no_ops() {
    let mut rng = StdRng::seed_from_u64(5);
    let config = config();
    let generator = RandomTreeGenerator::from_config(&config);
    let leaf = Node::variable(Variable::Close);

    assert!(subtree_mutation(&leaf, &config, &generator, &mut rng).is_none());
    assert!(is_transposition(&leaf, &config, &mut rng).is_none());
    assert!(ris_transposition(&leaf, &config, &mut rng).is_none());
    assert!(inversion(&leaf, &mut rng).is_none());
    assert!(crossover(&leaf, &leaf, &config, &mut rng).is_none());
}

#[test]
fn test_point_mutation_keeps_kind_family() {
    let mut rng = StdRng::seed_from_u64(6);
    let config = config();
    let tree = Node::not(Node::variable(Variable::Close));

    for _ in 0..50 {
        let mutated = point_mutation(&tree, &config, &mut rng);
        // NOT has no same-arity partner, only the leaf can change
        assert_eq!(mutated.kind(), &NodeKind::Operator(Operator::Not));
        assert!(matches!(mutated.children()[0].kind(), NodeKind::Variable(_)));
    }

    let constant = Node::constant(999.0);
    for _ in 0..50 {
        match point_mutation(&constant, &config, &mut rng).kind() {
            NodeKind::Constant(v) => assert!(*v >= config.constant_min && *v <= config.constant_max),
            other => panic!("constant became {:?}", other),
        }
    }
}

#[test]
fn test_inversion_swaps_operands() {
    let mut rng = StdRng::seed_from_u64(7);
    let tree = Node::operator(
        Operator::Sub,
        vec![Node::variable(Variable::Close), Node::constant(1.0)],
    )
    .unwrap();
    let inverted = inversion(&tree, &mut rng).unwrap();
    assert_eq!(inverted.to_formula(), "1 - close");
}

#[test]
fn test_ris_transposition_adds_boolean_root() {
    let mut rng = StdRng::seed_from_u64(8);
    let tree = Node::compare(Comparator::Gt, Node::variable(Variable::Close), Node::constant(1.0));
    let out = ris_transposition(&tree, &config(), &mut rng).unwrap();
    assert!(matches!(out.kind(), NodeKind::Operator(Operator::And | Operator::Or)));
    assert_eq!(&out.children()[0], &tree);
}

#[test]
fn test_selection() {
    let mut rng = StdRng::seed_from_u64(9);
    let population = vec![
        scored("close > 1", 0.1, "0000000000000001"),
        scored("close > 2", 0.9, "0000000000000002"),
        scored("close > 3", f64::NAN, "0000000000000003"),
        scored("close > 4", -5.0, "0000000000000004"),
    ];

    // A tournament over the whole population with many draws finds the best
    let winner = tournament_selection(&population, 64, &mut rng).unwrap();
    assert_eq!(winner.fitness, 0.9);

    for _ in 0..50 {
        let pick = roulette_selection(&population, &mut rng).unwrap();
        assert!(pick.fitness > 0.0);
    }

    let elites = elitism(&population, 2);
    assert_eq!(elites.len(), 2);
    assert_eq!(elites[0].gene_id, "0000000000000002");
    assert_eq!(elites[1].gene_id, "0000000000000001");

    assert!(tournament_selection(&[], 3, &mut rng).is_none());
}

#[test]
fn test_structural_operators_stay_within_bounds() {
    let mut rng = StdRng::seed_from_u64(10);
    let config = EvolutionConfig {
        max_depth: 5,
        max_nodes: 20,
        ..Default::default()
    };
    let generator = RandomTreeGenerator::from_config(&config);
    let within = |tree: &Node| tree.depth() <= config.max_depth && tree.node_count() <= config.max_nodes;

    let trees: Vec<Node> = sample_trees(&mut rng, 300).into_iter().filter(|t| within(t)).collect();
    assert!(!trees.is_empty());

    let mut accepted = 0;
    for tree in &trees {
        for result in [
            subtree_mutation(tree, &config, &generator, &mut rng),
            is_transposition(tree, &config, &mut rng),
            ris_transposition(tree, &config, &mut rng),
        ]
        .into_iter()
        .flatten()
        {
            accepted += 1;
            assert!(
                within(&result),
                "depth {} nodes {} from {}",
                result.depth(),
                result.node_count(),
                tree.to_formula()
            );
        }
    }
    assert!(accepted > 0);
}

#[test]
fn test_is_transposition_always_changes_the_tree() {
    let config = config();
    let tree = parse_formula("close > 1").unwrap();

    let mut applied = 0;
    for seed in 0..200 {
        let mut rng = StdRng::seed_from_u64(seed);
        if let Some(out) = is_transposition(&tree, &config, &mut rng) {
            applied += 1;
            assert_ne!(out, tree, "seed {} returned the input unchanged", seed);
        }
    }
    assert!(applied > 0);

    let mut rng = StdRng::seed_from_u64(11);
    for tree in sample_trees(&mut rng.clone(), 100) {
        if let Some(out) = is_transposition(&tree, &config, &mut rng) {
            assert_ne!(out, tree);
        }
    }
}

#[test]
fn test_roulette_with_zero_fitness_is_uniform() {
    let mut rng = StdRng::seed_from_u64(12);
    let population = vec![
        scored("close > 1", 0.0, "0000000000000001"),
        scored("close > 2", 0.0, "0000000000000002"),
        scored("close > 3", 0.0, "0000000000000003"),
        scored("close > 4", 0.0, "0000000000000004"),
    ];

    let mut picked = std::collections::BTreeSet::new();
    for _ in 0..200 {
        let pick = roulette_selection(&population, &mut rng).unwrap();
        picked.insert(pick.gene.gene_id.clone());
    }
    assert_eq!(picked.len(), population.len());
}

#[test]
fn test_point_mutation_tolerates_inverted_constant_range() {
    let mut rng = StdRng::seed_from_u64(13);
    let config = EvolutionConfig {
        constant_min: 10.0,
        constant_max: -10.0,
        ..Default::default()
    };
    let constant = Node::constant(3.0);
    for _ in 0..20 {
        let mutated = point_mutation(&constant, &config, &mut rng);
        assert!(matches!(mutated.kind(), NodeKind::Constant(v) if v.is_finite()));
    }
}
