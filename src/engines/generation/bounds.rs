use crate::error::{CpfaError, Result};
use std::collections::HashSet;
use std::sync::Arc;

pub const PROBABILITY_OF_SWITCHING_TO_SEARCHING: &str = "ProbabilityOfSwitchingToSearching";
pub const PROBABILITY_OF_RETURNING_TO_NEST: &str = "ProbabilityOfReturningToNest";
pub const UNINFORMED_SEARCH_VARIATION: &str = "UninformedSearchVariation";
pub const RATE_OF_INFORMED_SEARCH_DECAY: &str = "RateOfInformedSearchDecay";
pub const RATE_OF_SITE_FIDELITY: &str = "RateOfSiteFidelity";
pub const RATE_OF_LAYING_PHEROMONE: &str = "RateOfLayingPheromone";
pub const RATE_OF_PHEROMONE_DECAY: &str = "RateOfPheromoneDecay";

/// The evolvable CPFA parameters in their canonical order.
pub const CPFA_PARAMETERS: [&str; 7] = [
    PROBABILITY_OF_SWITCHING_TO_SEARCHING,
    PROBABILITY_OF_RETURNING_TO_NEST,
    UNINFORMED_SEARCH_VARIATION,
    RATE_OF_INFORMED_SEARCH_DECAY,
    RATE_OF_SITE_FIDELITY,
    RATE_OF_LAYING_PHEROMONE,
    RATE_OF_PHEROMONE_DECAY,
];

/// Inclusive range for one named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBound {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl ParamBound {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Ordered, immutable bounds table shared by the operators and the serializer.
///
/// The order of entries is the gene order of every [`Genome`](super::Genome)
/// built against this table, and the iteration order used by crossover.
/// Cloning is cheap; clones share the same table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBounds {
    entries: Arc<[ParamBound]>,
}

impl ParameterBounds {
    pub fn new(entries: Vec<ParamBound>) -> Result<Self> {
        if entries.is_empty() {
            return Err(CpfaError::Configuration(
                "Bounds table must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for bound in &entries {
            if bound.name.trim().is_empty() {
                return Err(CpfaError::Configuration(
                    "Parameter name must not be empty".to_string(),
                ));
            }
            if !seen.insert(bound.name.as_str()) {
                return Err(CpfaError::Configuration(format!(
                    "Duplicate parameter '{}' in bounds table",
                    bound.name
                )));
            }
            if !bound.min.is_finite() || !bound.max.is_finite() || bound.min > bound.max {
                return Err(CpfaError::Configuration(format!(
                    "Invalid bound for '{}': [{}, {}]",
                    bound.name, bound.min, bound.max
                )));
            }
        }

        Ok(Self {
            entries: entries.into(),
        })
    }

    /// The seven CPFA parameters with their search ranges.
    pub fn cpfa() -> Self {
        let entries: Vec<ParamBound> = CPFA_PARAMETERS
            .iter()
            .map(|&name| {
                let max = match name {
                    UNINFORMED_SEARCH_VARIATION => 359.0,
                    RATE_OF_SITE_FIDELITY | RATE_OF_LAYING_PHEROMONE => 20.0,
                    _ => 1.0,
                };
                ParamBound::new(name, 0.0, max)
            })
            .collect();
        Self {
            entries: entries.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamBound> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ParamBound> {
        self.entries.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|b| b.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|b| b.name.as_str())
    }
}
