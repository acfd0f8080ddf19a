use crate::config::{ConfigSection, EvolutionConfig, SelectionMethod};
use crate::engines::generation::{
    ast::{Comparator, GeneExpression, Node},
    diversity::population_diversity,
    hall_of_fame::HallOfFame,
    operators::{self, crossover_genes, elitism, rank_key, Variator},
    tree_generator::RandomTreeGenerator,
};
use crate::error::Result;
use crate::types::FitnessResult;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default number of entries kept in the engine's hall of fame
pub const DEFAULT_HALL_OF_FAME_SIZE: usize = 20;

const MAX_REDRAWS: usize = 8;

/// External fitness function. Called once per individual per generation;
/// calls are independent of each other, which is what allows the
/// evaluation pass to fan out across threads.
pub trait FitnessEvaluator: Sync {
    fn evaluate(&self, gene: &GeneExpression) -> FitnessResult;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&GeneExpression) -> FitnessResult + Sync,
{
    fn evaluate(&self, gene: &GeneExpression) -> FitnessResult {
        self(gene)
    }
}

/// An individual together with its evaluation
#[derive(Debug, Clone)]
pub struct ScoredGene {
    pub gene: GeneExpression,
    pub fitness: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ScoredGene {
    pub fn new(gene: GeneExpression, result: FitnessResult) -> Self {
        Self {
            gene,
            fitness: result.fitness,
            metadata: result.metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub worst_fitness: f64,
    pub diversity: f64,
    pub best_gene_id: String,
    pub best_formula: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    TargetReached,
    Converged,
    GenerationBudget,
}

#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    /// Last evaluated population
    pub population: Vec<ScoredGene>,
    /// One entry per evaluated generation
    pub history: Vec<GenerationStats>,
    pub termination: TerminationReason,
}

impl EvolutionOutcome {
    /// Fittest individual of the final population
    pub fn best(&self) -> Option<&ScoredGene> {
        self.population
            .iter()
            .max_by(|a, b| rank_key(a.fitness).total_cmp(&rank_key(b.fitness)))
    }

    pub fn generations_run(&self) -> usize {
        self.history.len()
    }
}

pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, _generation: usize) {}
    fn on_generation_complete(&mut self, _stats: &GenerationStats, _hall_of_fame_size: usize) {}
    /// Only reported for sequential evaluation
    fn on_individual_evaluated(&mut self, _current: usize, _total: usize) {}
}

/// Callback that ignores every event
pub struct NoProgress;

impl ProgressCallback for NoProgress {}

/// Generational GEP loop.
///
/// Holds the only RNG used for variation, so a fixed `seed` together with a
/// deterministic evaluator reproduces a run exactly.
pub struct GepEngine {
    config: EvolutionConfig,
    generator: RandomTreeGenerator,
    hall_of_fame: HallOfFame,
    rng: StdRng,
}

impl GepEngine {
    pub fn new(config: EvolutionConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            generator: RandomTreeGenerator::from_config(&config),
            hall_of_fame: HallOfFame::new(DEFAULT_HALL_OF_FAME_SIZE),
            config,
            rng,
        })
    }

    pub fn with_generator(mut self, generator: RandomTreeGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_hall_of_fame_size(mut self, size: usize) -> Self {
        self.hall_of_fame = HallOfFame::new(size);
        self
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn generator(&self) -> &RandomTreeGenerator {
        &self.generator
    }

    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    /// Random comparator-rooted individuals for generation 0
    pub fn initialize_population(&mut self) -> Vec<GeneExpression> {
        (0..self.config.population_size)
            .map(|_| self.random_individual())
            .collect()
    }

    /// Comparator-rooted random tree, redrawn a few times if it exceeds
    /// `max_nodes`. When every redraw is too large the individual is the
    /// smallest tree that fits: a comparator over two terminals, or a
    /// lone terminal when even that is over budget.
    fn random_individual(&mut self) -> GeneExpression {
        let max_nodes = self.config.max_nodes;
        let mut root = self.generator.generate_signal(&mut self.rng);
        let mut redraws = 0;
        while root.node_count() > max_nodes && redraws < MAX_REDRAWS {
            root = self.generator.generate_signal(&mut self.rng);
            redraws += 1;
        }

        if root.node_count() > max_nodes {
            root = self.minimal_signal();
        }
        GeneExpression::with_random_id(root, &mut self.rng)
    }

    fn minimal_signal(&mut self) -> Node {
        if self.config.max_nodes < 3 || self.config.max_depth < 2 {
            return self.generator.random_terminal(&mut self.rng);
        }
        let cmp = *Comparator::ALL.choose(&mut self.rng).unwrap_or(&Comparator::Gt);
        let left = self.generator.random_terminal(&mut self.rng);
        let right = self.generator.random_terminal(&mut self.rng);
        Node::compare(cmp, left, right)
    }

    /// Truncate or top up a caller-supplied population to the configured size.
    fn fit_population(&mut self, mut population: Vec<GeneExpression>) -> Vec<GeneExpression> {
        let size = self.config.population_size;
        if population.len() != size {
            log::warn!(
                "Initial population has {} individuals, resizing to {}",
                population.len(),
                size
            );
        }
        population.truncate(size);
        while population.len() < size {
            population.push(self.random_individual());
        }
        population
    }

    /// Score every individual. Returns only once all evaluations are done,
    /// so selection never sees a partially evaluated generation.
    pub fn evaluate_population<E, C>(
        &self,
        population: Vec<GeneExpression>,
        evaluator: &E,
        callback: &mut C,
    ) -> Vec<ScoredGene>
    where
        E: FitnessEvaluator + ?Sized,
        C: ProgressCallback + ?Sized,
    {
        if self.config.parallel_evaluation {
            let results: Vec<FitnessResult> = population
                .par_iter()
                .map(|gene| evaluator.evaluate(gene))
                .collect();
            population
                .into_iter()
                .zip(results)
                .map(|(gene, result)| ScoredGene::new(gene, result))
                .collect()
        } else {
            let total = population.len();
            population
                .into_iter()
                .enumerate()
                .map(|(i, gene)| {
                    let result = evaluator.evaluate(&gene);
                    callback.on_individual_evaluated(i + 1, total);
                    ScoredGene::new(gene, result)
                })
                .collect()
        }
    }

    /// Build the next population: elites first, then offspring of
    /// selected pairs (crossover, then mutation of both children).
    pub fn next_generation(&mut self, scored: &[ScoredGene], generation: usize) -> Vec<GeneExpression> {
        if scored.is_empty() {
            return self.initialize_population();
        }

        let size = self.config.population_size;
        let mut next = elitism(scored, self.config.elitism_count);

        let variator = Variator::new(&self.config, &self.generator);
        while next.len() < size {
            let (Some(p1), Some(p2)) = (
                select(&self.config, scored, &mut self.rng),
                select(&self.config, scored, &mut self.rng),
            ) else {
                break;
            };

            let (c1, c2) = if self.rng.gen::<f64>() < self.config.crossover_rate {
                crossover_genes(&p1.gene, &p2.gene, generation, &self.config, &mut self.rng)
            } else {
                (
                    GeneExpression::offspring(p1.gene.root().clone(), &[&p1.gene], generation, &mut self.rng),
                    GeneExpression::offspring(p2.gene.root().clone(), &[&p2.gene], generation, &mut self.rng),
                )
            };

            next.push(variator.mutate_child(c1, &mut self.rng));
            if next.len() < size {
                next.push(variator.mutate_child(c2, &mut self.rng));
            }
        }

        next
    }

    /// Run the generational loop.
    ///
    /// `initial` replaces the random generation-0 population when given.
    pub fn evolve<E, C>(
        &mut self,
        initial: Option<Vec<GeneExpression>>,
        evaluator: &E,
        callback: &mut C,
    ) -> EvolutionOutcome
    where
        E: FitnessEvaluator + ?Sized,
        C: ProgressCallback + ?Sized,
    {
        let mut population = match initial {
            Some(genes) => self.fit_population(genes),
            None => self.initialize_population(),
        };

        let generations = self.config.num_generations.max(1);
        let mut history: Vec<GenerationStats> = Vec::with_capacity(generations);
        let mut scored = Vec::new();
        let mut termination = TerminationReason::GenerationBudget;

        for generation in 0..generations {
            callback.on_generation_start(generation);

            scored = self.evaluate_population(population, evaluator, callback);
            self.hall_of_fame.update(&scored, generation);

            let stats = compute_stats(generation, &scored);
            log::info!(
                "Generation {}: best {:.4}, avg {:.4}, worst {:.4}, diversity {:.3}",
                generation,
                stats.best_fitness,
                stats.avg_fitness,
                stats.worst_fitness,
                stats.diversity
            );
            callback.on_generation_complete(&stats, self.hall_of_fame.len());
            history.push(stats);

            if let Some(target) = self.config.target_fitness {
                if history.last().map(|s| s.best_fitness >= target).unwrap_or(false) {
                    log::info!("Target fitness {} reached at generation {}", target, generation);
                    termination = TerminationReason::TargetReached;
                    break;
                }
            }

            if self.config.stop_on_convergence
                && has_converged(&history, self.config.convergence_window, self.config.convergence_epsilon)
            {
                log::info!("Converged at generation {}", generation);
                termination = TerminationReason::Converged;
                break;
            }

            if generation + 1 == generations {
                break;
            }

            population = self.next_generation(&scored, generation + 1);
        }

        EvolutionOutcome {
            population: scored,
            history,
            termination,
        }
    }
}

fn select<'p, R: Rng>(
    config: &EvolutionConfig,
    population: &'p [ScoredGene],
    rng: &mut R,
) -> Option<&'p ScoredGene> {
    match config.selection_method {
        SelectionMethod::Tournament => operators::tournament_selection(population, config.tournament_size, rng),
        SelectionMethod::Roulette => operators::roulette_selection(population, rng),
    }
}

/// Best/average/worst fitness and diversity of one evaluated generation.
/// The average ignores non-finite fitness values.
pub fn compute_stats(generation: usize, scored: &[ScoredGene]) -> GenerationStats {
    let best = scored
        .iter()
        .max_by(|a, b| rank_key(a.fitness).total_cmp(&rank_key(b.fitness)));
    let worst_fitness = scored
        .iter()
        .map(|s| rank_key(s.fitness))
        .min_by(|a, b| a.total_cmp(b))
        .unwrap_or(f64::NAN);

    let finite: Vec<f64> = scored
        .iter()
        .map(|s| s.fitness)
        .filter(|f| f.is_finite())
        .collect();
    let avg_fitness = if finite.is_empty() {
        f64::NAN
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    };

    GenerationStats {
        generation,
        best_fitness: best.map(|s| s.fitness).unwrap_or(f64::NAN),
        avg_fitness,
        worst_fitness,
        diversity: population_diversity(scored.iter().map(|s| s.gene.root())),
        best_gene_id: best.map(|s| s.gene.gene_id.clone()).unwrap_or_default(),
        best_formula: best.map(|s| s.gene.formula()).unwrap_or_default(),
    }
}

/// True when the best fitness over the trailing `window` generations
/// varies by less than `epsilon`.
pub fn has_converged(history: &[GenerationStats], window: usize, epsilon: f64) -> bool {
    if window == 0 || history.len() < window {
        return false;
    }

    let tail = &history[history.len() - window..];
    let (lo, hi) = tail.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        let f = rank_key(s.best_fitness);
        (lo.min(f), hi.max(f))
    });
    hi - lo < epsilon
}
