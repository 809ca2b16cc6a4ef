//! Regression system configuration
//!
//! [`Configuration`] is bound to a record type: the target column must be one
//! of the record's fields. Out-of-range settings fall back to defaults instead
//! of failing. [`RegressionSettings`] is the serde/TOML form of the same data.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{RegressionError, Result};
use crate::schema::Record;

/// Budget used when none is configured or the configured one is too short
pub const DEFAULT_TRAINING_TIME: Duration = Duration::from_secs(20);

/// Shortest budget honored as configured
pub const MIN_TRAINING_TIME: Duration = Duration::from_secs(1);

/// Share of a dataset held out for evaluation by default
pub const DEFAULT_EVALUATION_FRACTION: f64 = 0.25;

/// Serializable settings, e.g. loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSettings {
    /// Field of the record whose value is predicted
    pub target_column: String,
    /// Search budget in seconds
    #[serde(default)]
    pub max_training_time_secs: Option<u64>,
    /// Share of each training dataset held out for evaluation
    #[serde(default)]
    pub evaluation_fraction: Option<f64>,
}

impl RegressionSettings {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            max_training_time_secs: None,
            evaluation_fraction: None,
        }
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RegressionError::Config(format!("Failed to parse settings: {}", e)))
    }

    /// Load settings from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading regression settings from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            RegressionError::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }
}

/// Validated configuration of a regression system over records of type `T`
pub struct Configuration<T> {
    target_column: String,
    max_training_time: Option<Duration>,
    evaluation_fraction: f64,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Configuration<T> {
    /// Create a configuration predicting `target_column`
    ///
    /// Fails with `InvalidArgument` when the name is blank or is not a field of `T`.
    pub fn new(target_column: impl Into<String>) -> Result<Self> {
        let target_column = target_column.into();

        if target_column.trim().is_empty() {
            return Err(RegressionError::invalid(
                "target_column",
                "target column name is blank",
            ));
        }

        if !T::has_field(&target_column) {
            return Err(RegressionError::invalid(
                "target_column",
                format!(
                    "Column {} does not exist in {}",
                    target_column,
                    std::any::type_name::<T>()
                ),
            ));
        }

        Ok(Self {
            target_column,
            max_training_time: None,
            evaluation_fraction: DEFAULT_EVALUATION_FRACTION,
            _record: PhantomData,
        })
    }

    /// Build from deserialized settings, applying the same rules as the setters
    pub fn from_settings(settings: RegressionSettings) -> Result<Self> {
        let mut config = Self::new(settings.target_column)?;
        if let Some(secs) = settings.max_training_time_secs {
            config.set_max_training_time(Duration::from_secs(secs));
        }
        if let Some(fraction) = settings.evaluation_fraction {
            config.set_evaluation_fraction(fraction);
        }
        Ok(config)
    }

    pub fn with_max_training_time(mut self, max_training_time: Duration) -> Self {
        self.set_max_training_time(max_training_time);
        self
    }

    pub fn with_evaluation_fraction(mut self, fraction: f64) -> Self {
        self.set_evaluation_fraction(fraction);
        self
    }
}

impl<T> Configuration<T> {
    pub fn set_max_training_time(&mut self, max_training_time: Duration) {
        self.max_training_time = Some(max_training_time);
    }

    /// Values outside (0, 1] (and NaN) are replaced by the default fraction
    pub fn set_evaluation_fraction(&mut self, fraction: f64) {
        self.evaluation_fraction = if fraction > 0.0 && fraction <= 1.0 {
            fraction
        } else {
            debug!(
                "Evaluation fraction {} out of (0, 1], using {}",
                fraction, DEFAULT_EVALUATION_FRACTION
            );
            DEFAULT_EVALUATION_FRACTION
        };
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn evaluation_fraction(&self) -> f64 {
        self.evaluation_fraction
    }

    /// Budget as configured, before defaulting
    pub fn max_training_time(&self) -> Option<Duration> {
        self.max_training_time
    }

    /// Whole-second budget handed to the model search
    pub fn training_budget(&self) -> Duration {
        match self.max_training_time {
            Some(time) if time >= MIN_TRAINING_TIME => Duration::from_secs(time.as_secs()),
            _ => DEFAULT_TRAINING_TIME,
        }
    }

    pub fn to_settings(&self) -> RegressionSettings {
        RegressionSettings {
            target_column: self.target_column.clone(),
            max_training_time_secs: self.max_training_time.map(|d| d.as_secs()),
            evaluation_fraction: Some(self.evaluation_fraction),
        }
    }
}

impl<T> Clone for Configuration<T> {
    fn clone(&self) -> Self {
        Self {
            target_column: self.target_column.clone(),
            max_training_time: self.max_training_time,
            evaluation_fraction: self.evaluation_fraction,
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Configuration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("target_column", &self.target_column)
            .field("max_training_time", &self.max_training_time)
            .field("evaluation_fraction", &self.evaluation_fraction)
            .finish()
    }
}
