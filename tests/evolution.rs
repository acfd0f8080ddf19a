use std::sync::mpsc;
use tradegene::config::{BacktestingConfig, EvolutionConfig, SelectionMethod};
use tradegene::engines::evaluation::SignalBacktester;
use tradegene::engines::generation::evolution_engine::{
    GenerationStats, GepEngine, NoProgress, ProgressCallback, ScoredGene, TerminationReason,
};
use tradegene::engines::generation::multi_objective::MultiObjectiveGep;
use tradegene::engines::generation::progress::{ChannelProgressCallback, ProgressMessage};
use tradegene::engines::generation::GeneExpression;
use tradegene::types::{Bar, FitnessResult};

fn parsimony(gene: &GeneExpression) -> FitnessResult {
    FitnessResult::new(1.0 / gene.node_count() as f64)
}

fn config(seed: u64) -> EvolutionConfig {
    EvolutionConfig {
        population_size: 50,
        num_generations: 30,
        seed: Some(seed),
        ..Default::default()
    }
}

/// Records the last completed generation, like a UI would
struct Recorder {
    completed: Vec<usize>,
}

impl ProgressCallback for Recorder {
    fn on_generation_complete(&mut self, stats: &GenerationStats, _hall_of_fame_size: usize) {
        self.completed.push(stats.generation);
    }
}

#[test]
fn test_best_fitness_never_decreases_with_elitism() {
    let mut engine = GepEngine::new(config(7)).unwrap();
    let mut recorder = Recorder { completed: Vec::new() };
    let outcome = engine.evolve(None, &parsimony, &mut recorder);

    assert_eq!(outcome.history.len(), 30);
    assert_eq!(outcome.termination, TerminationReason::GenerationBudget);
    assert_eq!(recorder.completed, (0..30).collect::<Vec<_>>());
    assert_eq!(outcome.population.len(), 50);

    for pair in outcome.history.windows(2) {
        assert!(
            pair[1].best_fitness >= pair[0].best_fitness,
            "best fitness dropped from {} to {} at generation {}",
            pair[0].best_fitness,
            pair[1].best_fitness,
            pair[1].generation
        );
    }
    for stats in &outcome.history {
        assert!(stats.worst_fitness <= stats.avg_fitness && stats.avg_fitness <= stats.best_fitness);
        assert!((0.0..=1.0).contains(&stats.diversity));
    }
}

#[test]
fn test_elites_survive_unchanged() {
    let mut engine = GepEngine::new(EvolutionConfig {
        population_size: 20,
        elitism_count: 3,
        mutation_rate: 1.0,
        seed: Some(11),
        ..Default::default()
    })
    .unwrap();

    let population = engine.initialize_population();
    let scored = engine.evaluate_population(population, &parsimony, &mut NoProgress);
    let next = engine.next_generation(&scored, 1);
    assert_eq!(next.len(), 20);

    let mut ranked: Vec<&ScoredGene> = scored.iter().collect();
    ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    for (elite, carried) in ranked.iter().take(3).zip(&next) {
        assert_eq!(carried.root(), elite.gene.root());
        assert_eq!(carried.gene_id, elite.gene.gene_id);
    }

    // Offspring are new individuals of the next generation
    for child in &next[3..] {
        assert_eq!(child.generation, 1);
        assert!(!child.lineage.parent_ids.is_empty());
    }
}

#[test]
fn test_fixed_seed_is_deterministic() {
    let run = |seed: u64| {
        let mut engine = GepEngine::new(EvolutionConfig {
            num_generations: 10,
            ..config(seed)
        })
        .unwrap();
        let outcome = engine.evolve(None, &parsimony, &mut NoProgress);
        let formulas: Vec<String> = outcome.population.iter().map(|s| s.gene.formula()).collect();
        let ids: Vec<String> = outcome.population.iter().map(|s| s.gene.gene_id.clone()).collect();
        (outcome.history, formulas, ids)
    };

    assert_eq!(run(42), run(42));
    assert_ne!(run(42).2, run(43).2);
}

#[test]
fn test_parallel_evaluation_matches_sequential() {
    let run = |parallel: bool| {
        let mut engine = GepEngine::new(EvolutionConfig {
            num_generations: 5,
            parallel_evaluation: parallel,
            ..config(5)
        })
        .unwrap();
        engine.evolve(None, &parsimony, &mut NoProgress).history
    };
    assert_eq!(run(false), run(true));
}

#[test]
fn test_target_fitness_stops_early() {
    let mut engine = GepEngine::new(EvolutionConfig {
        target_fitness: Some(0.0),
        ..config(3)
    })
    .unwrap();
    let outcome = engine.evolve(None, &parsimony, &mut NoProgress);
    assert_eq!(outcome.termination, TerminationReason::TargetReached);
    assert_eq!(outcome.generations_run(), 1);
}

#[test]
fn test_convergence_stops_flat_runs() {
    let mut engine = GepEngine::new(EvolutionConfig {
        stop_on_convergence: true,
        convergence_window: 3,
        ..config(9)
    })
    .unwrap();
    let flat = |_: &GeneExpression| FitnessResult::new(1.0);
    let outcome = engine.evolve(None, &flat, &mut NoProgress);
    assert_eq!(outcome.termination, TerminationReason::Converged);
    assert_eq!(outcome.generations_run(), 3);
}

#[test]
fn test_initial_population_is_resized() {
    let mut engine = GepEngine::new(EvolutionConfig {
        population_size: 10,
        num_generations: 1,
        elitism_count: 1,
        seed: Some(1),
        ..Default::default()
    })
    .unwrap();
    let seed_genes: Vec<GeneExpression> = engine.initialize_population().into_iter().take(4).collect();
    let outcome = engine.evolve(Some(seed_genes.clone()), &parsimony, &mut NoProgress);

    assert_eq!(outcome.population.len(), 10);
    for gene in &seed_genes {
        assert!(outcome.population.iter().any(|s| s.gene.gene_id == gene.gene_id));
    }
}

#[test]
fn test_roulette_selection_runs() {
    let mut engine = GepEngine::new(EvolutionConfig {
        selection_method: SelectionMethod::Roulette,
        num_generations: 5,
        ..config(21)
    })
    .unwrap();
    let outcome = engine.evolve(None, &parsimony, &mut NoProgress);
    assert_eq!(outcome.history.len(), 5);
    assert!(!engine.hall_of_fame().is_empty());
}

#[test]
fn test_channel_progress_reports_each_generation() {
    let (tx, rx) = mpsc::channel();
    let mut callback = ChannelProgressCallback::new(tx);
    let mut engine = GepEngine::new(EvolutionConfig {
        num_generations: 3,
        population_size: 10,
        seed: Some(2),
        ..Default::default()
    })
    .unwrap();
    engine.evolve(None, &parsimony, &mut callback);
    drop(callback);

    let messages: Vec<ProgressMessage> = rx.iter().collect();
    let completed = messages
        .iter()
        .filter(|m| matches!(m, ProgressMessage::GenerationComplete { .. }))
        .count();
    assert_eq!(completed, 3);
    assert!(messages
        .iter()
        .any(|m| matches!(m, ProgressMessage::IndividualEvaluated { current: 10, total: 10 })));
}

#[test]
fn test_multi_objective_combines_scores() {
    let mut gep = MultiObjectiveGep::new(EvolutionConfig {
        num_generations: 5,
        population_size: 20,
        seed: Some(4),
        ..Default::default()
    })
    .unwrap()
    .add_objective("parsimony", |g: &GeneExpression| 1.0 / g.node_count() as f64)
    .add_objective("shallow", |g: &GeneExpression| 1.0 / g.depth() as f64);

    let outcome = gep.evolve(None, &mut NoProgress).unwrap();
    let best = outcome.best().unwrap();
    let parsimony = best.metadata["parsimony"].as_f64().unwrap();
    let shallow = best.metadata["shallow"].as_f64().unwrap();
    assert!((best.fitness - 0.5 * (parsimony + shallow)).abs() < 1e-12);
}

#[test]
fn test_backtester_as_fitness() {
    let bars: Vec<Bar> = (0..120)
        .map(|i| {
            let price = 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.05;
            Bar::new(price, price + 1.0, price - 1.0, price, 1000.0)
        })
        .collect();
    let backtester = SignalBacktester::new(bars, BacktestingConfig::default()).unwrap();
    let mut engine = GepEngine::new(EvolutionConfig {
        population_size: 16,
        num_generations: 3,
        parallel_evaluation: true,
        seed: Some(8),
        ..Default::default()
    })
    .unwrap();

    let outcome = engine.evolve(None, &backtester, &mut NoProgress);
    let best = outcome.best().unwrap();
    assert!(best.fitness.is_finite());
    assert!(best.metadata.contains_key("num_trades"));
}

#[test]
fn test_initial_population_respects_max_nodes() {
    let mut engine = GepEngine::new(EvolutionConfig {
        population_size: 2000,
        max_depth: 8,
        max_nodes: 3,
        seed: Some(1),
        ..Default::default()
    })
    .unwrap();

    let population = engine.initialize_population();
    let oversized: Vec<usize> = population
        .iter()
        .map(|g| g.node_count())
        .filter(|&n| n > 3)
        .collect();
    assert!(oversized.is_empty(), "oversized initial members {:?}", oversized);

    let mut tiny = GepEngine::new(EvolutionConfig {
        population_size: 50,
        max_nodes: 1,
        seed: Some(2),
        ..Default::default()
    })
    .unwrap();
    assert!(tiny.initialize_population().iter().all(|g| g.node_count() == 1));
}
