pub mod evaluator;
pub mod simulator;

pub use evaluator::{evaluate_population, mean_score, EvaluationReport, Evaluator};
pub use simulator::{parse_score, ArgosEvaluator};
