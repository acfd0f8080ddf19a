pub mod ast;
pub mod parser;
pub mod templates;
pub mod tree_generator;
pub mod operators;
pub mod diversity;
pub mod hall_of_fame;
pub mod evolution_engine;
pub mod multi_objective;
pub mod progress;

pub use ast::*;
pub use parser::{parse_formula, FormulaParser, ParseMode};
pub use tree_generator::RandomTreeGenerator;
pub use operators::{Variator, VariationKind};
pub use diversity::{population_diversity, structural_distance};
pub use hall_of_fame::{EliteGene, HallOfFame};
pub use evolution_engine::{
    EvolutionOutcome, FitnessEvaluator, GenerationStats, GepEngine, NoProgress, ProgressCallback,
    ScoredGene, TerminationReason,
};
pub use multi_objective::{MultiObjectiveGep, WeightedObjectives};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, ProgressMessage};
