use super::traits::{check_rate, ConfigSection};
use crate::error::TradegeneError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub num_generations: usize,

    // Per-gene / per-pair variation probabilities
    pub mutation_rate: f64,
    pub subtree_mutation_rate: f64,
    pub crossover_rate: f64,
    pub is_transposition_rate: f64,
    pub ris_transposition_rate: f64,
    pub inversion_rate: f64,

    pub selection_method: SelectionMethod,
    pub tournament_size: usize,
    pub elitism_count: usize,

    // Structural bounds, enforced by the generator and every operator
    pub max_depth: usize,
    pub max_nodes: usize,

    /// Domain constants are clamped to after point mutation
    pub constant_min: f64,
    pub constant_max: f64,

    // Termination
    pub target_fitness: Option<f64>,
    pub convergence_window: usize,
    pub convergence_epsilon: f64,
    pub stop_on_convergence: bool,

    /// Fan fitness evaluation out over the rayon pool
    pub parallel_evaluation: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMethod {
    Tournament,
    Roulette,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            num_generations: 30,
            mutation_rate: 0.1,
            subtree_mutation_rate: 0.05,
            crossover_rate: 0.7,
            is_transposition_rate: 0.1,
            ris_transposition_rate: 0.1,
            inversion_rate: 0.1,
            selection_method: SelectionMethod::Tournament,
            tournament_size: 3,
            elitism_count: 2,
            max_depth: 6,
            max_nodes: 50,
            constant_min: -1000.0,
            constant_max: 1000.0,
            target_fitness: None,
            convergence_window: 10,
            convergence_epsilon: 1e-6,
            stop_on_convergence: false,
            parallel_evaluation: false,
            seed: None,
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<(), TradegeneError> {
        if self.population_size < 2 {
            return Err(TradegeneError::Configuration(
                "Population size must be at least 2".to_string()
            ));
        }
        check_rate("mutation_rate", self.mutation_rate)?;
        check_rate("subtree_mutation_rate", self.subtree_mutation_rate)?;
        check_rate("crossover_rate", self.crossover_rate)?;
        check_rate("is_transposition_rate", self.is_transposition_rate)?;
        check_rate("ris_transposition_rate", self.ris_transposition_rate)?;
        check_rate("inversion_rate", self.inversion_rate)?;

        if self.elitism_count >= self.population_size {
            return Err(TradegeneError::Configuration(format!(
                "Elitism count ({}) must be smaller than population size ({})",
                self.elitism_count, self.population_size
            )));
        }
        if self.tournament_size == 0 {
            return Err(TradegeneError::Configuration(
                "Tournament size must be at least 1".to_string()
            ));
        }
        if self.max_depth == 0 || self.max_nodes == 0 {
            return Err(TradegeneError::Configuration(
                "max_depth and max_nodes must be positive".to_string()
            ));
        }
        if !(self.constant_min < self.constant_max) {
            return Err(TradegeneError::Configuration(format!(
                "constant_min ({}) must be below constant_max ({})",
                self.constant_min, self.constant_max
            )));
        }
        if self.stop_on_convergence && self.convergence_window < 2 {
            return Err(TradegeneError::Configuration(
                "Convergence window must span at least 2 generations".to_string()
            ));
        }
        Ok(())
    }
}
