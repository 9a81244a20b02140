use crate::config::{ConfigSection, RunConfig};
use crate::data::checkpoint::{CheckpointStore, GenerationSnapshot};
use crate::engines::evaluation::{evaluate_population, Evaluator};
use crate::engines::generation::{
    bounds::ParameterBounds,
    genome::{FitnessRecord, Genome},
    operators::{crossover, mutate, random_genome, select_parents},
    population::Population,
    progress::{LogProgress, ProgressCallback},
};
use crate::error::{CpfaError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::ThreadPool;
use serde::Serialize;
use std::path::PathBuf;

/// Where the optimizer is within the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Initialized,
    Evaluating,
    Sorted,
    Reproducing,
    Terminated,
}

/// What one generation produced.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub failed_trials: usize,
    pub seeds: Vec<u32>,
    pub table_path: PathBuf,
}

/// Generational GA over CPFA parameters.
///
/// Each [`step`](Self::step) draws a shared seed list, scores every genome on
/// the worker pool, sorts, checkpoints, and breeds the next population from
/// elites plus tournament/crossover/mutation offspring. Generations
/// `0..=config.gens` are run, so a cap of `g` executes `g + 1` generations.
pub struct Optimizer<E: Evaluator> {
    config: RunConfig,
    bounds: ParameterBounds,
    evaluator: E,
    store: CheckpointStore,
    pool: ThreadPool,
    rng: StdRng,
    progress: Box<dyn ProgressCallback>,
    population: Population,
    last_evaluated: Option<Population>,
    state: GenerationState,
}

impl<E: Evaluator> Optimizer<E> {
    pub fn new(
        config: RunConfig,
        bounds: ParameterBounds,
        evaluator: E,
        store: CheckpointStore,
    ) -> Result<Self> {
        config.validate()?;
        if store.bounds() != &bounds {
            return Err(CpfaError::Configuration(format!(
                "Checkpoint table has {} parameter columns, optimizer expects {}",
                store.bounds().len(),
                bounds.len()
            )));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("trial-worker-{}", i))
            .build()
            .map_err(|e| CpfaError::Configuration(format!("Failed to build worker pool: {}", e)))?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let genomes = (0..config.pop_size)
            .map(|_| random_genome(&bounds, &mut rng))
            .collect();
        let population = Population::from_genomes(0, genomes);

        log::info!(
            "Initialized population of {} ({} elites, mutation rate {}, {} trials/generation, {} workers)",
            config.pop_size,
            config.elites,
            config.mut_rate,
            config.tests_per_gen,
            config.workers
        );

        Ok(Self {
            config,
            bounds,
            evaluator,
            store,
            pool,
            rng,
            progress: Box::new(LogProgress),
            population,
            last_evaluated: None,
            state: GenerationState::Initialized,
        })
    }

    pub fn with_progress<C: ProgressCallback + 'static>(mut self, progress: C) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Population awaiting evaluation in the next step.
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Most recently evaluated population, sorted best first.
    pub fn last_evaluated(&self) -> Option<&Population> {
        self.last_evaluated.as_ref()
    }

    pub fn best(&self) -> Option<&FitnessRecord> {
        self.last_evaluated.as_ref().and_then(|p| p.best())
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn is_terminated(&self) -> bool {
        self.state == GenerationState::Terminated
    }

    /// Run generations until the cap is passed.
    pub fn run(&mut self) -> Result<Vec<GenerationSummary>> {
        let mut summaries = Vec::with_capacity(self.config.gens + 1);
        while let Some(summary) = self.step()? {
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Execute one generation. Returns `None` once the run has terminated.
    ///
    /// A fatal error terminates the run; nothing is checkpointed for the
    /// generation it occurred in.
    pub fn step(&mut self) -> Result<Option<GenerationSummary>> {
        if self.is_terminated() {
            return Ok(None);
        }

        let generation = self.population.generation();

        self.state = GenerationState::Evaluating;
        let seeds: Vec<u32> = (0..self.config.tests_per_gen)
            .map(|_| self.rng.gen::<u32>())
            .collect();
        self.progress.on_generation_start(generation, &seeds);

        let report =
            match evaluate_population(&self.evaluator, &self.pool, &self.population, &seeds) {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Generation {} aborted: {}", generation, e);
                    self.state = GenerationState::Terminated;
                    return Err(e);
                }
            };
        let mut evaluated = self.population.clone();
        evaluated.assign_fitness(&report.fitness);

        evaluated.sort_descending();
        self.state = GenerationState::Sorted;

        // tests_per_gen >= 1 is validated, so there is always a last seed
        let last_seed = seeds.last().copied().unwrap_or_default();
        let table_path = self
            .store
            .save(&GenerationSnapshot::capture(&evaluated, last_seed))?;

        self.state = GenerationState::Reproducing;
        let next = self.reproduce(&evaluated);
        debug_assert_eq!(next.len(), self.config.pop_size);

        let summary = GenerationSummary {
            generation,
            best_fitness: evaluated.best().map(|r| r.fitness).unwrap_or_default(),
            mean_fitness: evaluated.mean_fitness(),
            failed_trials: report.failed_trials,
            seeds,
            table_path,
        };

        self.population = Population::from_genomes(generation + 1, next);
        self.last_evaluated = Some(evaluated);
        self.state = if generation + 1 > self.config.gens {
            GenerationState::Terminated
        } else {
            GenerationState::Evaluating
        };

        self.progress.on_generation_complete(&summary);
        Ok(Some(summary))
    }

    /// Elites first, then offspring until the population is full.
    fn reproduce(&mut self, sorted: &Population) -> Vec<Genome> {
        let parents = sorted.records();
        let mut next = sorted.elites(self.config.elites);

        while next.len() < self.config.pop_size {
            let (p1, p2) = select_parents(parents, &mut self.rng);
            let mut child = crossover(&parents[p1].genome, &parents[p2].genome);
            mutate(&mut child, &self.bounds, self.config.mut_rate, &mut self.rng);
            next.push(child);
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::ParamBound;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fitness is the sum of all genes; counts calls.
    struct GeneSum {
        calls: Arc<AtomicUsize>,
    }

    impl Evaluator for GeneSum {
        fn evaluate(&self, genome: &Genome, _seed: u32) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(genome.genes().iter().sum())
        }
    }

    fn config(pop_size: usize, elites: usize, gens: usize) -> RunConfig {
        RunConfig {
            pop_size,
            elites,
            gens,
            tests_per_gen: 3,
            workers: 2,
            seed: Some(17),
            ..Default::default()
        }
    }

    fn optimizer(
        config: RunConfig,
        dir: &std::path::Path,
    ) -> (Optimizer<GeneSum>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let bounds = ParameterBounds::cpfa();
        let store = CheckpointStore::open(dir, bounds.clone()).unwrap();
        let optimizer = Optimizer::new(
            config,
            bounds,
            GeneSum {
                calls: Arc::clone(&calls),
            },
            store,
        )
        .unwrap();
        (optimizer, calls)
    }

    #[test]
    fn test_runs_gens_plus_one_generations() {
        let dir = tempfile::tempdir().unwrap();
        let (mut opt, calls) = optimizer(config(6, 1, 2), dir.path());
        assert_eq!(opt.state(), GenerationState::Initialized);

        let summaries = opt.run().unwrap();
        assert_eq!(summaries.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3 * 6 * 3);
        assert!(opt.is_terminated());
        for generation in 0..3 {
            assert!(opt.store().path_for(generation).is_file());
        }
        assert!(!opt.store().path_for(3).exists());
        assert!(opt.step().unwrap().is_none());
    }

    #[test]
    fn test_population_size_is_invariant() {
        let dir = tempfile::tempdir().unwrap();
        let (mut opt, _) = optimizer(config(7, 2, 4), dir.path());
        while !opt.is_terminated() {
            assert_eq!(opt.population().len(), 7);
            opt.step().unwrap();
            assert_eq!(opt.population().len(), 7);
            assert_eq!(opt.last_evaluated().unwrap().len(), 7);
        }
    }

    #[test]
    fn test_elites_carry_over_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let (mut opt, _) = optimizer(config(8, 3, 1), dir.path());
        opt.step().unwrap();

        let sorted = opt.last_evaluated().unwrap().clone();
        let next: Vec<Genome> = opt.population().genomes().cloned().collect();
        for i in 0..3 {
            assert_eq!(next[i], sorted.records()[i].genome);
        }
    }

    #[test]
    fn test_evaluated_population_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let (mut opt, _) = optimizer(config(10, 1, 0), dir.path());
        opt.run().unwrap();
        let fitness: Vec<f64> = opt
            .last_evaluated()
            .unwrap()
            .records()
            .iter()
            .map(|r| r.fitness)
            .collect();
        assert!(fitness.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_best_fitness_never_regresses_with_elitism() {
        // Deterministic evaluator + elites => best score is monotone
        let dir = tempfile::tempdir().unwrap();
        let (mut opt, _) = optimizer(config(10, 1, 5), dir.path());
        let summaries = opt.run().unwrap();
        for pair in summaries.windows(2) {
            assert!(pair[1].best_fitness >= pair[0].best_fitness);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let (mut first, _) = optimizer(config(5, 1, 2), a.path());
        let (mut second, _) = optimizer(config(5, 1, 2), b.path());
        let s1 = first.run().unwrap();
        let s2 = second.run().unwrap();
        for (x, y) in s1.iter().zip(&s2) {
            assert_eq!(x.seeds, y.seeds);
            assert_eq!(x.best_fitness, y.best_fitness);
        }
    }

    #[test]
    fn test_channel_progress_receives_every_generation() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let (opt, _) = optimizer(config(4, 1, 3), dir.path());
        let mut opt = opt.with_progress(crate::engines::generation::ChannelProgress::new(tx));
        opt.run().unwrap();

        let generations: Vec<usize> = rx.try_iter().map(|s| s.generation).collect();
        assert_eq!(generations, vec![0, 1, 2, 3]);
    }

    /// Rejects every genome as if rendered against the wrong parameter table.
    struct WrongTable;

    impl Evaluator for WrongTable {
        fn evaluate(&self, genome: &Genome, _seed: u32) -> Result<f64> {
            Err(CpfaError::Configuration(format!(
                "Genome has {} genes, expected 1",
                genome.len()
            )))
        }
    }

    #[test]
    fn test_fatal_evaluation_error_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let bounds = ParameterBounds::cpfa();
        let store = CheckpointStore::open(dir.path(), bounds.clone()).unwrap();
        let mut opt = Optimizer::new(config(4, 1, 3), bounds, WrongTable, store).unwrap();

        assert!(matches!(opt.run(), Err(CpfaError::Configuration(_))));
        assert!(opt.is_terminated());
        assert!(opt.last_evaluated().is_none());
        assert!(!opt.store().path_for(0).exists());
        assert!(opt.step().unwrap().is_none());
    }

    #[test]
    fn test_mismatched_store_bounds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let short = ParameterBounds::new(vec![ParamBound::new(
            "probability_of_switching_to_searching",
            0.0,
            1.0,
        )])
        .unwrap();
        let store = CheckpointStore::open(dir.path(), short).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = Optimizer::new(
            config(4, 1, 0),
            ParameterBounds::cpfa(),
            GeneSum {
                calls: Arc::clone(&calls),
            },
            store,
        );
        assert!(matches!(result, Err(CpfaError::Configuration(_))));
    }

    #[test]
    fn test_invalid_config_fails_before_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let bounds = ParameterBounds::cpfa();
        let store = CheckpointStore::open(dir.path(), bounds.clone()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = Optimizer::new(
            config(3, 4, 1),
            bounds,
            GeneSum {
                calls: Arc::clone(&calls),
            },
            store,
        );
        assert!(matches!(result, Err(CpfaError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
