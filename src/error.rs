use thiserror::Error;

#[derive(Error, Debug)]
pub enum CpfaError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Evaluation failure: {0}")]
    Evaluation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CpfaError {
    /// Failures that abort the run rather than being contained at the trial.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CpfaError::Evaluation(_))
    }
}

pub type Result<T> = std::result::Result<T, CpfaError>;
