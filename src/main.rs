use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use cpfa_evolve::config::{ConfigManager, Platform, RunConfig};
use cpfa_evolve::data::{read_population, CheckpointStore, ConfigurationSerializer};
use cpfa_evolve::engines::evaluation::ArgosEvaluator;
use cpfa_evolve::engines::generation::{Optimizer, ParameterBounds};
use std::path::PathBuf;

/// Seed written into experiment files generated outside of a GA run.
const DEFAULT_EXPORT_SEED: u32 = 1337;

#[derive(Parser)]
#[command(name = "cpfa-evolve", about = "Evolve CPFA foraging parameters with ARGoS")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the genetic algorithm
    Run(RunArgs),
    /// Print the CPFA parameters of the best (or every) genome in a generation table
    Inspect {
        #[arg(short = 'f', long = "gen-file")]
        gen_file: PathBuf,
        #[arg(short, long)]
        all: bool,
    },
    /// Print a full ARGoS experiment file for the best genome in a generation table
    Create {
        #[arg(short = 'f', long = "gen-file")]
        gen_file: PathBuf,
        #[arg(short, long, default_value_t = 10)]
        robots: usize,
        #[arg(short, long, default_value_t = 300)]
        length: u64,
        #[arg(long, default_value = "linux")]
        system: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// TOML run file; CPFA_* environment variables override its values
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(short = 's', long)]
    system: Option<String>,
    #[arg(short = 'r', long)]
    robots: Option<usize>,
    #[arg(short = 'm', long = "mut-rate")]
    mut_rate: Option<f64>,
    #[arg(short = 'e', long)]
    elites: Option<usize>,
    #[arg(short = 'g', long)]
    gens: Option<usize>,
    #[arg(short = 'p', long = "pop-size")]
    pop_size: Option<usize>,
    /// Simulated duration in seconds
    #[arg(short = 't', long = "time")]
    time: Option<u64>,
    #[arg(short = 'k', long = "tests-per-gen")]
    tests_per_gen: Option<usize>,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long = "trial-timeout")]
    trial_timeout_secs: Option<u64>,
}

impl RunArgs {
    fn resolve(&self) -> anyhow::Result<RunConfig> {
        let mut manager = ConfigManager::new();
        if let Some(path) = &self.config {
            manager
                .load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
        }

        let system = match &self.system {
            Some(s) => Some(s.parse::<Platform>()?),
            None => None,
        };

        manager.update(|c| {
            if let Some(system) = system {
                c.system = system;
            }
            if let Some(v) = self.robots {
                c.robots = v;
            }
            if let Some(v) = self.mut_rate {
                c.mut_rate = v;
            }
            if let Some(v) = self.elites {
                c.elites = v;
            }
            if let Some(v) = self.gens {
                c.gens = v;
            }
            if let Some(v) = self.pop_size {
                c.pop_size = v;
            }
            if let Some(v) = self.time {
                c.length = v;
            }
            if let Some(v) = self.tests_per_gen {
                c.tests_per_gen = v;
            }
            if let Some(v) = self.workers {
                c.workers = v;
            }
            if let Some(v) = self.trial_timeout_secs {
                c.trial_timeout_secs = v;
            }
            if self.seed.is_some() {
                c.seed = self.seed;
            }
        })?;

        Ok(manager.get())
    }
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    let bounds = ParameterBounds::cpfa();
    let start_time = chrono::Utc::now().timestamp();

    let store = CheckpointStore::for_run(&config, start_time, bounds.clone())
        .context("creating checkpoint directory")?;
    log::info!("Saving generations to {}", store.dir().display());

    // Keep the effective settings next to the checkpoints
    ConfigManager::with_config(config.clone())?.save_to_file(store.dir().join("run.toml"))?;

    let serializer = ConfigurationSerializer::from_config(bounds.clone(), &config);
    let evaluator = ArgosEvaluator::from_config(serializer, &config)?;
    let mut optimizer = Optimizer::new(config, bounds.clone(), evaluator, store)?;

    let summaries = optimizer.run()?;

    let best = match optimizer.best() {
        Some(best) => best,
        None => bail!("run finished without evaluating any generation"),
    };
    let parameters: serde_json::Map<String, serde_json::Value> = best
        .genome
        .named(&bounds)
        .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
        .collect();
    let report = serde_json::json!({
        "save_dir": optimizer.store().dir(),
        "generations": summaries,
        "best_fitness": best.fitness,
        "best": parameters,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn inspect(gen_file: PathBuf, all: bool) -> anyhow::Result<()> {
    let bounds = ParameterBounds::cpfa();
    let population = read_population(&gen_file, &bounds)
        .with_context(|| format!("reading {}", gen_file.display()))?;
    if population.is_empty() {
        bail!("{} has no rows", gen_file.display());
    }

    let serializer = ConfigurationSerializer::new(bounds, 6, 3600, Platform::Linux);
    let shown = if all { population.len() } else { 1 };
    for record in population.iter().take(shown) {
        println!("Fitness: {}", record.fitness);
        println!("{}", serializer.render_cpfa_chunk(&record.genome)?);
    }
    Ok(())
}

fn create(gen_file: PathBuf, robots: usize, length: u64, system: String) -> anyhow::Result<()> {
    let bounds = ParameterBounds::cpfa();
    let platform: Platform = system.parse()?;
    let population = read_population(&gen_file, &bounds)
        .with_context(|| format!("reading {}", gen_file.display()))?;
    let best = match population.first() {
        Some(best) => best,
        None => bail!("{} has no rows", gen_file.display()),
    };

    let serializer = ConfigurationSerializer::new(bounds, robots, length, platform);
    print!("{}", serializer.render(&best.genome, DEFAULT_EXPORT_SEED)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Inspect { gen_file, all } => inspect(gen_file, all),
        Command::Create {
            gen_file,
            robots,
            length,
            system,
        } => create(gen_file, robots, length, system),
    }
}
