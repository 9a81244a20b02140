use crate::engines::generation::genome::{FitnessRecord, Genome};

/// Fixed-size ordered set of fitness records for one generation.
#[derive(Debug, Clone)]
pub struct Population {
    generation: usize,
    records: Vec<FitnessRecord>,
}

impl Population {
    /// Fresh, not yet evaluated population; every fitness starts at zero.
    pub fn from_genomes(generation: usize, genomes: Vec<Genome>) -> Self {
        let records = genomes
            .into_iter()
            .map(|g| FitnessRecord::new(g, 0.0))
            .collect();
        Self {
            generation,
            records,
        }
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FitnessRecord] {
        &self.records
    }

    pub fn genomes(&self) -> impl Iterator<Item = &Genome> {
        self.records.iter().map(|r| &r.genome)
    }

    /// Overwrite every record's fitness; values are matched by position.
    pub fn assign_fitness(&mut self, fitness: &[f64]) {
        debug_assert_eq!(fitness.len(), self.records.len());
        for (record, &f) in self.records.iter_mut().zip(fitness) {
            record.fitness = f;
        }
    }

    /// Stable sort, best first. Equal fitness keeps the current relative order.
    pub fn sort_descending(&mut self) {
        self.records.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    }

    /// Copies of the first `count` genomes.
    pub fn elites(&self, count: usize) -> Vec<Genome> {
        self.records
            .iter()
            .take(count)
            .map(|r| r.genome.clone())
            .collect()
    }

    pub fn best(&self) -> Option<&FitnessRecord> {
        self.records.first()
    }

    pub fn mean_fitness(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.records.iter().map(|r| r.fitness).sum::<f64>() / self.records.len() as f64
    }
}
