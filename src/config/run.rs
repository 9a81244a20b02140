use super::traits::ConfigSection;
use crate::error::CpfaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Host platform of the simulator build; selects the shared-library paths
/// written into the experiment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Darwin,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }

    pub fn controller_library(&self) -> &'static str {
        match self {
            Self::Linux => "build/source/libiAnt_controller",
            Self::Darwin => "build/controllers/libiAnt_controller.dylib",
        }
    }

    pub fn loop_functions_library(&self) -> &'static str {
        match self {
            Self::Linux => "build/source/libiAnt_loop_functions",
            Self::Darwin => "build/loop_functions/libiAnt_loop_functions.dylib",
        }
    }
}

impl FromStr for Platform {
    type Err = CpfaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Self::Linux),
            "darwin" => Ok(Self::Darwin),
            other => Err(CpfaError::Configuration(format!(
                "Unknown platform '{}', expected 'linux' or 'darwin'",
                other
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for one optimisation run. Never mutated once the optimizer
/// has been built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub pop_size: usize,
    /// Generation cap; generations `0..=gens` are executed.
    pub gens: usize,
    pub elites: usize,
    /// Probability that a gene is left untouched by mutation.
    pub mut_rate: f64,
    pub tests_per_gen: usize,
    pub robots: usize,
    /// Simulated duration in seconds (`MaxSimTime`).
    pub length: u64,
    pub system: Platform,

    pub workers: usize,
    pub trial_timeout_secs: u64,
    pub seed: Option<u64>,
    pub save_root: PathBuf,
    pub experiments_dir: PathBuf,
    pub simulator: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pop_size: 50,
            gens: 20,
            elites: 1,
            mut_rate: 0.1,
            tests_per_gen: 10,
            robots: 10,
            length: 3600,
            system: Platform::Linux,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            trial_timeout_secs: 3600,
            seed: None,
            save_root: PathBuf::from("gapy_saves"),
            experiments_dir: PathBuf::from("experiments"),
            simulator: "argos3".to_string(),
        }
    }
}

impl RunConfig {
    pub fn trial_timeout(&self) -> Duration {
        Duration::from_secs(self.trial_timeout_secs)
    }

    /// Directory name for this run's checkpoints, e.g. `1700000000_e_1_p_50_r_10_t_3600_k_10`.
    pub fn run_dir_name(&self, start_time: i64) -> String {
        format!(
            "{}_e_{}_p_{}_r_{}_t_{}_k_{}",
            start_time, self.elites, self.pop_size, self.robots, self.length, self.tests_per_gen
        )
    }
}

impl ConfigSection for RunConfig {
    fn section_name() -> &'static str {
        "run"
    }

    fn validate(&self) -> Result<(), CpfaError> {
        if self.pop_size == 0 {
            return Err(CpfaError::Configuration(
                "Population size must be at least 1".to_string(),
            ));
        }
        if self.elites > self.pop_size {
            return Err(CpfaError::Configuration(format!(
                "Elite count {} exceeds population size {}",
                self.elites, self.pop_size
            )));
        }
        if !(0.0..=1.0).contains(&self.mut_rate) {
            return Err(CpfaError::Configuration(
                "Mutation rate must be between 0 and 1".to_string(),
            ));
        }
        if self.tests_per_gen == 0 {
            return Err(CpfaError::Configuration(
                "At least one trial per generation is required".to_string(),
            ));
        }
        if self.robots == 0 {
            return Err(CpfaError::Configuration(
                "Robot count must be at least 1".to_string(),
            ));
        }
        if self.length == 0 {
            return Err(CpfaError::Configuration(
                "Simulated duration must be positive".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(CpfaError::Configuration(
                "Worker pool needs at least one thread".to_string(),
            ));
        }
        if self.trial_timeout_secs == 0 {
            return Err(CpfaError::Configuration(
                "Trial timeout must be positive".to_string(),
            ));
        }
        if self.simulator.trim().is_empty() {
            return Err(CpfaError::Configuration(
                "Simulator command must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
