//! Genome representation for the CPFA parameter search
//!
//! A genome is one candidate's vector of real-valued CPFA parameters. Gene `i`
//! belongs to entry `i` of the [`ParameterBounds`] table the genome was built
//! against, so the bounds table is always passed alongside it rather than
//! stored inside.
//!
//! Genomes are plain values: elites are cloned into the next generation,
//! never shared.

use super::bounds::ParameterBounds;
use crate::error::{CpfaError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    genes: Vec<f64>,
}

impl Genome {
    /// Build a genome from raw gene values, checking arity and bounds.
    pub fn new(bounds: &ParameterBounds, genes: Vec<f64>) -> Result<Self> {
        if genes.len() != bounds.len() {
            return Err(CpfaError::Configuration(format!(
                "Genome has {} genes but the bounds table has {} parameters",
                genes.len(),
                bounds.len()
            )));
        }
        for (bound, &value) in bounds.iter().zip(&genes) {
            if !bound.contains(value) {
                return Err(CpfaError::Configuration(format!(
                    "{} = {} is outside [{}, {}]",
                    bound.name, value, bound.min, bound.max
                )));
            }
        }
        Ok(Self { genes })
    }

    /// Crate-internal constructor for operators that already guarantee bounds.
    pub(crate) fn from_clamped(genes: Vec<f64>) -> Self {
        Self { genes }
    }

    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    pub(crate) fn genes_mut(&mut self) -> &mut [f64] {
        &mut self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn get(&self, bounds: &ParameterBounds, name: &str) -> Option<f64> {
        bounds.index_of(name).and_then(|i| self.genes.get(i).copied())
    }

    /// `(name, value)` pairs in bounds-table order.
    pub fn named<'a>(&'a self, bounds: &'a ParameterBounds) -> impl Iterator<Item = (&'a str, f64)> {
        bounds.names().zip(self.genes.iter().copied())
    }

    pub fn within(&self, bounds: &ParameterBounds) -> bool {
        self.genes.len() == bounds.len()
            && bounds.iter().zip(&self.genes).all(|(b, &v)| b.contains(v))
    }
}

/// A genome together with the fitness it earned in one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessRecord {
    pub genome: Genome,
    pub fitness: f64,
}

impl FitnessRecord {
    pub fn new(genome: Genome, fitness: f64) -> Self {
        Self { genome, fitness }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::bounds::RATE_OF_SITE_FIDELITY;

    #[test]
    fn test_new_checks_arity() {
        let bounds = ParameterBounds::cpfa();
        assert!(Genome::new(&bounds, vec![0.5; 3]).is_err());
    }

    #[test]
    fn test_new_checks_bounds() {
        let bounds = ParameterBounds::cpfa();
        let mut genes = vec![0.5; 7];
        genes[0] = 1.5;
        assert!(Genome::new(&bounds, genes).is_err());
    }

    #[test]
    fn test_named_lookup() {
        let bounds = ParameterBounds::cpfa();
        let genes = vec![0.1, 0.2, 100.0, 0.4, 5.0, 6.0, 0.7];
        let genome = Genome::new(&bounds, genes).unwrap();
        assert_eq!(genome.get(&bounds, RATE_OF_SITE_FIDELITY), Some(5.0));
        assert_eq!(genome.get(&bounds, "NotAParameter"), None);
        assert_eq!(genome.named(&bounds).count(), 7);
        assert!(genome.within(&bounds));
    }
}
