use crate::engines::generation::{Genome, Population};
use crate::error::{CpfaError, Result};
use rayon::prelude::*;
use rayon::ThreadPool;

/// Scores one genome under one simulator seed.
///
/// Implementations must be pure with respect to their inputs: trials of a
/// generation run concurrently on the worker pool and share nothing but the
/// evaluator itself. An [`CpfaError::Evaluation`] marks a failed trial; it is
/// scored 0 by [`evaluate_population`] and never aborts the generation. Any
/// other error is fatal and ends the run.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, genome: &Genome, seed: u32) -> Result<f64>;
}

/// Aggregated result of scoring a whole population against one seed list.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Mean trial score per genome, in population order.
    pub fitness: Vec<f64>,
    /// Trials that failed and were scored 0.
    pub failed_trials: usize,
}

/// Arithmetic mean of a genome's trial scores.
pub fn mean_score(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Fan every (genome, seed) trial out over `pool` and wait for all of them.
///
/// Every genome faces the same `seeds`. Fitness is the mean over all seeds,
/// failed trials contributing 0 to the sum. A fatal error from any trial is
/// returned once all trials have finished.
pub fn evaluate_population<E: Evaluator + ?Sized>(
    evaluator: &E,
    pool: &ThreadPool,
    population: &Population,
    seeds: &[u32],
) -> Result<EvaluationReport> {
    let genomes: Vec<&Genome> = population.genomes().collect();
    let trials: Vec<(usize, usize)> = (0..genomes.len())
        .flat_map(|g| (0..seeds.len()).map(move |t| (g, t)))
        .collect();

    let outcomes: Vec<Result<(usize, Option<f64>)>> = pool.install(|| {
        trials
            .par_iter()
            .map(|&(g, t)| {
                let seed = seeds[t];
                log::debug!("pop {} at test {} with seed {}", g, t, seed);
                match evaluator.evaluate(genomes[g], seed) {
                    Ok(score) => {
                        log::debug!("pop {} test {} partial fitness = {}", g, t, score);
                        Ok((g, Some(score)))
                    }
                    Err(e) if e.is_fatal() => Err(e),
                    Err(e) => {
                        log::error!("pop {} test {} (seed {}) failed: {}", g, t, seed, e);
                        Ok((g, None))
                    }
                }
            })
            .collect()
    });
    let outcomes = outcomes.into_iter().collect::<Result<Vec<_>>>()?;

    let mut scores: Vec<Vec<f64>> = vec![Vec::with_capacity(seeds.len()); genomes.len()];
    let mut failed_trials = 0;
    for (g, outcome) in outcomes {
        match outcome {
            Some(score) => scores[g].push(score),
            None => {
                failed_trials += 1;
                scores[g].push(0.0);
            }
        }
    }

    let fitness = scores
        .iter()
        .enumerate()
        .map(|(g, trial_scores)| {
            let total: f64 = trial_scores.iter().sum();
            let mean = mean_score(trial_scores);
            log::info!("pop {} total fitness = {}, avg fitness = {}", g, total, mean);
            mean
        })
        .collect();

    Ok(EvaluationReport {
        fitness,
        failed_trials,
    })
}
