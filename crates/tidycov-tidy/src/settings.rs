//! Tidy pipeline configuration.

use serde::{Deserialize, Serialize};
use tidycov_data::ConfigurationError;

/// Default minimum fraction of the population a covariate must reach.
pub const DEFAULT_MIN_FRACTION: f64 = 0.001;

/// Configuration for the tidy pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidySettings {
    /// Minimum fraction of the population with a non-zero value (default: 0.001)
    pub min_fraction: f64,
    /// Rescale covariates to [0, 1] by their maximum (default: true)
    pub normalize: bool,
    /// Remove constant covariates and one member of exhaustive groups (default: true)
    pub remove_redundancy: bool,
}

impl Default for TidySettings {
    fn default() -> Self {
        Self {
            min_fraction: DEFAULT_MIN_FRACTION,
            normalize: true,
            remove_redundancy: true,
        }
    }
}

impl TidySettings {
    /// Check the settings against the population they will run on.
    pub fn validate(&self, population_size: usize) -> Result<(), ConfigurationError> {
        if !(self.min_fraction > 0.0 && self.min_fraction < 1.0) {
            return Err(ConfigurationError::InvalidMinFraction(self.min_fraction));
        }
        if self.normalize && population_size == 0 {
            return Err(ConfigurationError::EmptyPopulation);
        }
        Ok(())
    }
}
