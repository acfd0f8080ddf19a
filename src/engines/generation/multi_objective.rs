use crate::config::EvolutionConfig;
use crate::engines::generation::ast::GeneExpression;
use crate::engines::generation::evolution_engine::{
    EvolutionOutcome, FitnessEvaluator, GepEngine, ProgressCallback,
};
use crate::error::{Result, TradegeneError};
use crate::types::FitnessResult;

type ObjectiveFn = Box<dyn Fn(&GeneExpression) -> f64 + Send + Sync>;

pub struct Objective {
    pub name: String,
    weight: Option<f64>,
    score: ObjectiveFn,
}

/// Weighted sum of named objectives, usable as a plain fitness evaluator.
///
/// Objectives without an explicit weight share the weight left over by the
/// weighted ones equally; with no weights at all every objective gets `1/n`.
#[derive(Default)]
pub struct WeightedObjectives {
    objectives: Vec<Objective>,
}

impl WeightedObjectives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, name: impl Into<String>, weight: Option<f64>, score: F)
    where
        F: Fn(&GeneExpression) -> f64 + Send + Sync + 'static,
    {
        self.objectives.push(Objective {
            name: name.into(),
            weight,
            score: Box::new(score),
        });
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    /// Objectives that would end up with no weight: unweighted ones when the
    /// explicit weights already sum to 1 or more.
    pub fn starved(&self) -> Vec<&str> {
        let explicit: f64 = self.objectives.iter().filter_map(|o| o.weight).sum();
        if explicit < 1.0 {
            return Vec::new();
        }
        self.objectives
            .iter()
            .filter(|o| o.weight.is_none())
            .map(|o| o.name.as_str())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.objectives.iter().map(|o| o.name.as_str()).collect()
    }

    /// Effective weight per objective, in insertion order
    pub fn weights(&self) -> Vec<f64> {
        let explicit: f64 = self.objectives.iter().filter_map(|o| o.weight).sum();
        let implicit = self.objectives.iter().filter(|o| o.weight.is_none()).count();
        let share = if implicit == 0 {
            0.0
        } else if explicit == 0.0 {
            1.0 / implicit as f64
        } else {
            (1.0 - explicit).max(0.0) / implicit as f64
        };

        self.objectives
            .iter()
            .map(|o| o.weight.unwrap_or(share))
            .collect()
    }
}

impl FitnessEvaluator for WeightedObjectives {
    fn evaluate(&self, gene: &GeneExpression) -> FitnessResult {
        let weights = self.weights();
        let mut combined = 0.0;
        let mut metadata = serde_json::Map::new();

        for (objective, weight) in self.objectives.iter().zip(weights) {
            let score = (objective.score)(gene);
            combined += weight * score;
            metadata.insert(objective.name.clone(), serde_json::json!(score));
        }

        FitnessResult {
            fitness: combined,
            metadata,
        }
    }
}

/// GEP run over a linear combination of objectives
pub struct MultiObjectiveGep {
    engine: GepEngine,
    objectives: WeightedObjectives,
}

impl MultiObjectiveGep {
    pub fn new(config: EvolutionConfig) -> Result<Self> {
        Ok(Self {
            engine: GepEngine::new(config)?,
            objectives: WeightedObjectives::new(),
        })
    }

    /// Objective sharing the default weight
    pub fn add_objective<F>(mut self, name: impl Into<String>, score: F) -> Self
    where
        F: Fn(&GeneExpression) -> f64 + Send + Sync + 'static,
    {
        self.objectives.add(name, None, score);
        self
    }

    pub fn add_weighted_objective<F>(mut self, name: impl Into<String>, weight: f64, score: F) -> Self
    where
        F: Fn(&GeneExpression) -> f64 + Send + Sync + 'static,
    {
        self.objectives.add(name, Some(weight), score);
        self
    }

    pub fn objectives(&self) -> &WeightedObjectives {
        &self.objectives
    }

    pub fn engine(&self) -> &GepEngine {
        &self.engine
    }

    pub fn evolve<C>(
        &mut self,
        initial: Option<Vec<GeneExpression>>,
        callback: &mut C,
    ) -> Result<EvolutionOutcome>
    where
        C: ProgressCallback + ?Sized,
    {
        if self.objectives.is_empty() {
            return Err(TradegeneError::Configuration(
                "multi-objective run needs at least one objective".to_string(),
            ));
        }
        if self.objectives.weights().iter().any(|w| !w.is_finite()) {
            return Err(TradegeneError::Configuration(
                "objective weights must be finite".to_string(),
            ));
        }
        let starved = self.objectives.starved();
        if !starved.is_empty() {
            return Err(TradegeneError::Configuration(format!(
                "explicit weights leave nothing for unweighted objectives {:?}",
                starved
            )));
        }

        log::info!(
            "Multi-objective run over {:?} with weights {:?}",
            self.objectives.names(),
            self.objectives.weights()
        );
        Ok(self.engine.evolve(initial, &self.objectives, callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::ast::Node;

    fn gene() -> GeneExpression {
        GeneExpression::new(Node::constant(1.0), "0000000000000001")
    }

    #[test]
    fn test_default_weights_are_equal() {
        let mut objectives = WeightedObjectives::new();
        objectives.add("a", None, |_| 1.0);
        objectives.add("b", None, |_| 3.0);

        assert_eq!(objectives.weights(), vec![0.5, 0.5]);
        let result = objectives.evaluate(&gene());
        assert!((result.fitness - 2.0).abs() < 1e-12);
        assert_eq!(result.metadata.get("b"), Some(&serde_json::json!(3.0)));
    }

    #[test]
    fn test_explicit_weights_leave_remainder() {
        let mut objectives = WeightedObjectives::new();
        objectives.add("a", Some(0.8), |_| 1.0);
        objectives.add("b", None, |_| 1.0);
        let w = objectives.weights();
        assert!((w[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_evolve_without_objectives_fails() {
        let config = EvolutionConfig {
            population_size: 4,
            num_generations: 1,
            elitism_count: 1,
            seed: Some(1),
            ..Default::default()
        };
        let mut gep = MultiObjectiveGep::new(config).unwrap();
        assert!(gep.evolve(None, &mut crate::engines::generation::evolution_engine::NoProgress).is_err());
    }

    #[test]
    fn test_unweighted_objectives_need_a_remainder() {
        let config = EvolutionConfig {
            population_size: 4,
            num_generations: 1,
            elitism_count: 1,
            seed: Some(1),
            ..Default::default()
        };
        let mut gep = MultiObjectiveGep::new(config)
            .unwrap()
            .add_weighted_objective("a", 1.0, |_: &GeneExpression| 1.0)
            .add_objective("b", |_: &GeneExpression| 1.0);

        assert_eq!(gep.objectives().starved(), vec!["b"]);
        let result = gep.evolve(None, &mut crate::engines::generation::evolution_engine::NoProgress);
        assert!(matches!(result, Err(TradegeneError::Configuration(_))));
    }
}
