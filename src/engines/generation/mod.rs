pub mod bounds;
pub mod genome;
pub mod operators;
pub mod population;
pub mod evolution_engine;
pub mod progress;

pub use bounds::{ParamBound, ParameterBounds, CPFA_PARAMETERS};
pub use genome::{FitnessRecord, Genome};
pub use population::Population;
pub use evolution_engine::{GenerationState, GenerationSummary, Optimizer};
pub use progress::{ChannelProgress, LogProgress, ProgressCallback};
