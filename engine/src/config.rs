//! Engine options from the environment.
//!
//! | Variable                 | Field                       | Default   |
//! |--------------------------|-----------------------------|-----------|
//! | `SDTL_ENGINE`            | `engine`                    | `memory`  |
//! | `SDTL_LOG_LEVEL`         | `log_level`                 | `info`    |
//! | `SDTL_MEDIAN_ACCURACY`   | `median_accuracy`           | 1_000_000 |
//! | `SDTL_VALIDATION_OUTPUT` | `default_validation_output` | `invalid` |
//!
//! A `.env` file in the working directory is read first.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine::{create_engine, ProcessingEngine, ENGINE_NAMES};
use crate::error::{SessionError, SessionResult};
use crate::logs::LogLevel;
use crate::model::ValidationOutput;

/// Percentile accuracy handed to distributed backends for `median`.
pub const DEFAULT_MEDIAN_ACCURACY: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Processing engine name, one of [`ENGINE_NAMES`].
    pub engine: String,
    pub log_level: LogLevel,
    pub median_accuracy: u64,
    /// Output of `check_datapoint` when the script does not name one.
    pub default_validation_output: ValidationOutput,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            engine: "memory".to_string(),
            log_level: LogLevel::Info,
            median_accuracy: DEFAULT_MEDIAN_ACCURACY,
            default_validation_output: ValidationOutput::Invalid,
        }
    }
}

impl EngineOptions {
    /// Read options from `.env` and the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Options from an arbitrary variable lookup. Invalid values keep their
    /// default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(engine) = lookup("SDTL_ENGINE") {
            if ENGINE_NAMES.contains(&engine.as_str()) {
                options.engine = engine;
            } else {
                warn!("SDTL_ENGINE={} is not one of {:?}, using {}", engine, ENGINE_NAMES, options.engine);
            }
        }
        if let Some(level) = lookup("SDTL_LOG_LEVEL") {
            match LogLevel::parse(&level) {
                Some(level) => options.log_level = level,
                None => warn!("SDTL_LOG_LEVEL={} is not a log level, using {:?}", level, options.log_level),
            }
        }
        if let Some(accuracy) = lookup("SDTL_MEDIAN_ACCURACY") {
            match accuracy.parse::<u64>() {
                Ok(accuracy) if accuracy > 0 => options.median_accuracy = accuracy,
                _ => warn!(
                    "SDTL_MEDIAN_ACCURACY={} is not a positive integer, using {}",
                    accuracy, options.median_accuracy
                ),
            }
        }
        if let Some(output) = lookup("SDTL_VALIDATION_OUTPUT") {
            match output.to_lowercase().as_str() {
                "invalid" => options.default_validation_output = ValidationOutput::Invalid,
                "all" => options.default_validation_output = ValidationOutput::All,
                _ => warn!("SDTL_VALIDATION_OUTPUT={} is not invalid or all, using invalid", output),
            }
        }
        options
    }

    /// Instantiate the configured processing engine.
    pub fn create_engine(&self) -> SessionResult<Box<dyn ProcessingEngine>> {
        create_engine(&self.engine).ok_or_else(|| SessionError::UnknownEngine(self.engine.clone()))
    }
}
