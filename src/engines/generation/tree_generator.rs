use crate::config::EvolutionConfig;
use crate::engines::generation::ast::{Comparator, Node, NodeKind, Operator, OperatorFamily, Variable};
use crate::functions::indicators::{self, Params};
use rand::seq::SliceRandom;
use rand::Rng;

/// Probability of a function node (operator or comparator) per draw
pub const FUNCTION_PROBABILITY: f64 = 0.3;
/// Probability of an indicator leaf per draw
pub const INDICATOR_PROBABILITY: f64 = 0.3;

/// Builds random trees bounded by a depth budget.
///
/// Every recursion consumes one unit of budget and a budget of 1 always
/// yields a terminal, so generation terminates and a tree built with budget
/// `d` has depth at most `d`.
#[derive(Debug, Clone)]
pub struct RandomTreeGenerator {
    max_depth: usize,
    constant_range: (f64, f64),
}

impl RandomTreeGenerator {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            constant_range: (0.0, 100.0),
        }
    }

    /// Generator matching an evolution config. Fresh constants are drawn
    /// from [0, 100] intersected with the configured constant domain.
    pub fn from_config(config: &EvolutionConfig) -> Self {
        let lo = config.constant_min.max(0.0);
        let hi = config.constant_max.min(100.0);
        let range = if lo < hi {
            (lo, hi)
        } else {
            (config.constant_min, config.constant_max)
        };
        Self::new(config.max_depth).with_constant_range(range.0, range.1)
    }

    pub fn with_constant_range(mut self, lo: f64, hi: f64) -> Self {
        if lo < hi {
            self.constant_range = (lo, hi);
        }
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> Node {
        self.generate_with_budget(self.max_depth, rng)
    }

    pub fn generate_with_budget<R: Rng>(&self, budget: usize, rng: &mut R) -> Node {
        if budget <= 1 {
            return self.random_terminal(rng);
        }

        let roll = rng.gen::<f64>();
        if roll < FUNCTION_PROBABILITY {
            self.random_function(budget, rng)
        } else if roll < FUNCTION_PROBABILITY + INDICATOR_PROBABILITY {
            self.random_indicator(rng)
        } else {
            self.random_terminal(rng)
        }
    }

    /// A comparator-rooted tree whose operands are numeric expressions.
    /// Falls back to [`generate`](Self::generate) when the depth budget is
    /// too small for a comparator.
    pub fn generate_signal<R: Rng>(&self, rng: &mut R) -> Node {
        if self.max_depth < 2 {
            return self.generate(rng);
        }
        let cmp = *Comparator::ALL.choose(rng).unwrap_or(&Comparator::Gt);
        let left = self.generate_numeric(self.max_depth - 1, rng);
        let right = self.generate_numeric(self.max_depth - 1, rng);
        Node::compare(cmp, left, right)
    }

    /// Numeric-valued tree: arithmetic operators, indicators and terminals.
    pub fn generate_numeric<R: Rng>(&self, budget: usize, rng: &mut R) -> Node {
        if budget <= 1 {
            return self.random_terminal(rng);
        }

        let roll = rng.gen::<f64>();
        if roll < FUNCTION_PROBABILITY {
            let arithmetic: Vec<Operator> = Operator::ALL
                .into_iter()
                .filter(|op| op.family() == OperatorFamily::Arithmetic)
                .collect();
            let op = *arithmetic.choose(rng).unwrap_or(&Operator::Add);
            let children = (0..op.arity())
                .map(|_| self.generate_numeric(budget - 1, rng))
                .collect();
            Node::from_parts(NodeKind::Operator(op), children)
        } else if roll < FUNCTION_PROBABILITY + INDICATOR_PROBABILITY {
            self.random_indicator(rng)
        } else {
            self.random_terminal(rng)
        }
    }

    fn random_function<R: Rng>(&self, budget: usize, rng: &mut R) -> Node {
        let choices = Operator::ALL.len() + Comparator::ALL.len();
        let pick = rng.gen_range(0..choices);
        let kind = if pick < Operator::ALL.len() {
            NodeKind::Operator(Operator::ALL[pick])
        } else {
            NodeKind::Comparator(Comparator::ALL[pick - Operator::ALL.len()])
        };

        let children = (0..kind.arity())
            .map(|_| self.generate_with_budget(budget - 1, rng))
            .collect();
        Node::from_parts(kind, children)
    }

    pub fn random_terminal<R: Rng>(&self, rng: &mut R) -> Node {
        if rng.gen_bool(0.5) {
            self.random_variable(rng)
        } else {
            self.random_constant(rng)
        }
    }

    pub fn random_variable<R: Rng>(&self, rng: &mut R) -> Node {
        Node::variable(*Variable::ALL.choose(rng).unwrap_or(&Variable::Close))
    }

    pub fn random_constant<R: Rng>(&self, rng: &mut R) -> Node {
        let (lo, hi) = self.constant_range;
        let value = rng.gen_range(lo..hi);
        Node::constant((value * 100.0).round() / 100.0)
    }

    /// Random registered indicator with parameters drawn around their
    /// defaults (up to three times the default, within the declared range).
    pub fn random_indicator<R: Rng>(&self, rng: &mut R) -> Node {
        let catalogue = indicators::all();
        let indicator = catalogue[rng.gen_range(0..catalogue.len())];

        let params: Params = indicator
            .params()
            .iter()
            .map(|spec| {
                let hi = (spec.default * 3.0).min(spec.max);
                let value = if spec.min < hi {
                    spec.normalize(rng.gen_range(spec.min..=hi))
                } else {
                    spec.default
                };
                (spec.name.to_string(), value)
            })
            .collect();

        Node::from_parts(
            NodeKind::Indicator {
                name: indicator.alias().to_string(),
                params,
            },
            Vec::new(),
        )
    }
}
