use super::evolution_engine::GenerationSummary;
use std::sync::mpsc::Sender;

/// Observer for generation lifecycle events, owned by the optimizer.
pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize, seeds: &[u32]);
    fn on_generation_complete(&mut self, summary: &GenerationSummary);
}

/// Forwards progress to the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_generation_start(&mut self, generation: usize, seeds: &[u32]) {
        log::info!("Starting generation: {}", generation);
        log::info!("Seeds for generation: {:?}", seeds);
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        log::info!(
            "Generation {} complete. Best fitness: {:.4}, mean: {:.4}, failed trials: {}",
            summary.generation,
            summary.best_fitness,
            summary.mean_fitness,
            summary.failed_trials
        );
    }
}

/// Sends every completed generation over a channel, e.g. to a monitoring thread.
pub struct ChannelProgress {
    sender: Sender<GenerationSummary>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<GenerationSummary>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_generation_start(&mut self, _generation: usize, _seeds: &[u32]) {}

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        let _ = self.sender.send(summary.clone());
    }
}
