use crate::engines::generation::bounds::ParameterBounds;
use crate::engines::generation::genome::{FitnessRecord, Genome};
use rand::Rng;
use rand_distr::StandardNormal;

/// Standard deviation of the Gaussian perturbation applied by [`mutate`].
pub const MUTATION_SIGMA: f64 = 0.05;

/// Candidates drawn per parent slot.
pub const BINARY_TOURNAMENT: usize = 2;

/// Draw every gene independently and uniformly from its bound.
pub fn random_genome<R: Rng>(bounds: &ParameterBounds, rng: &mut R) -> Genome {
    let genes = bounds
        .iter()
        .map(|b| rng.gen_range(b.min..=b.max))
        .collect();
    Genome::from_clamped(genes)
}

/// Gaussian mutation with clamping.
///
/// A gene is perturbed when its uniform draw *exceeds* `rate`, so `rate` is
/// the probability of a gene being kept as-is: `rate = 0.0` perturbs every
/// gene and `rate = 1.0` perturbs none.
pub fn mutate<R: Rng>(genome: &mut Genome, bounds: &ParameterBounds, rate: f64, rng: &mut R) {
    for (gene, bound) in genome.genes_mut().iter_mut().zip(bounds.iter()) {
        if rng.gen::<f64>() > rate {
            let noise: f64 = rng.sample(StandardNormal);
            *gene = bound.clamp(*gene + MUTATION_SIGMA * noise);
        }
    }
}

/// Alternating gene-wise crossover.
///
/// The child starts as a copy of `parent2`; walking the genes in bounds-table
/// order, every second gene (indices 1, 3, 5, ...) is taken from `parent1`.
/// No gene is ever blended.
pub fn crossover(parent1: &Genome, parent2: &Genome) -> Genome {
    let mut child = parent2.clone();
    let mut from_p1 = false;
    for (gene, &donor) in child.genes_mut().iter_mut().zip(parent1.genes()) {
        if from_p1 {
            *gene = donor;
        }
        from_p1 = !from_p1;
    }
    child
}

/// Tournament selection: pick the best of `tournament_size` candidates drawn
/// with replacement. Returns the winner's index; ties keep the earliest draw.
pub fn tournament_selection<R: Rng>(
    population: &[FitnessRecord],
    tournament_size: usize,
    rng: &mut R,
) -> usize {
    let mut best_idx = rng.gen_range(0..population.len());
    let mut best_fitness = population[best_idx].fitness;

    for _ in 1..tournament_size {
        let idx = rng.gen_range(0..population.len());
        if population[idx].fitness > best_fitness {
            best_idx = idx;
            best_fitness = population[idx].fitness;
        }
    }

    best_idx
}

/// Two independent binary tournaments, one per parent slot.
pub fn select_parents<R: Rng>(population: &[FitnessRecord], rng: &mut R) -> (usize, usize) {
    let parent1 = tournament_selection(population, BINARY_TOURNAMENT, rng);
    let parent2 = tournament_selection(population, BINARY_TOURNAMENT, rng);
    (parent1, parent2)
}
