//! Optional TOML configuration file.
//!
//! ```toml
//! [tidy]
//! min_fraction = 0.01
//! normalize = true
//! remove_redundancy = false
//! ```
//!
//! Missing keys take their defaults; command-line flags override the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tidycov_tidy::TidySettings;

/// Error loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CliConfig {
    /// Tidy pipeline settings
    pub(crate) tidy: TidySettings,
}

/// Command-line overrides for the tidy settings.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TidyOverrides {
    pub(crate) min_fraction: Option<f64>,
    pub(crate) no_normalize: bool,
    pub(crate) no_redundancy: bool,
}

impl CliConfig {
    /// Load from `path`, or defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?),
            None => Ok(Self::default()),
        }
    }

    fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Tidy settings after applying command-line overrides.
    pub(crate) fn tidy_settings(&self, overrides: TidyOverrides) -> TidySettings {
        let mut settings = self.tidy;
        if let Some(min_fraction) = overrides.min_fraction {
            settings.min_fraction = min_fraction;
        }
        if overrides.no_normalize {
            settings.normalize = false;
        }
        if overrides.no_redundancy {
            settings.remove_redundancy = false;
        }
        settings
    }
}
