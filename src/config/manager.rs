use super::{run::RunConfig, traits::ConfigSection};
use crate::error::CpfaError;
use std::path::Path;

/// Environment variable prefix for overrides, e.g. `CPFA_POP_SIZE=20`.
pub const ENV_PREFIX: &str = "CPFA";

pub struct ConfigManager {
    config: RunConfig,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
        }
    }

    pub fn with_config(config: RunConfig) -> Result<Self, CpfaError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load a TOML run file, then apply `CPFA_*` environment overrides on top.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CpfaError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CpfaError::Configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| CpfaError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: RunConfig = settings
            .try_deserialize()
            .map_err(|e| CpfaError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        log::debug!(
            "Loaded [{}] section from {}",
            RunConfig::section_name(),
            path.display()
        );

        self.config = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CpfaError> {
        let toml_str = toml::to_string_pretty(&self.config)
            .map_err(|e| CpfaError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| CpfaError::Storage(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> RunConfig {
        self.config.clone()
    }

    pub fn update<F>(&mut self, f: F) -> Result<(), CpfaError>
    where
        F: FnOnce(&mut RunConfig),
    {
        let mut candidate = self.config.clone();
        f(&mut candidate);
        candidate.validate()?;
        self.config = candidate;
        Ok(())
    }
}
