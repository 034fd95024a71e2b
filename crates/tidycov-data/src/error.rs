//! Error types for covariate store operations.

use crate::types::{AnalysisId, CovariateId, RowId, TimeId};
use thiserror::Error;

/// Result type for covariate operations.
pub type Result<T> = std::result::Result<T, CovariateError>;

/// Invalid settings, reported before any data is scanned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Minimum fraction outside the open interval (0, 1)
    #[error("Invalid minimum fraction: {0} (must be strictly between 0 and 1)")]
    InvalidMinFraction(f64),

    /// Normalization requested for a cohort without subjects
    #[error("Population size is 0; cannot normalize an empty cohort")]
    EmptyPopulation,

    /// Population size could not be determined
    #[error("Population size is unknown; supply it explicitly")]
    MissingPopulation,

    /// Tidying a store that carries time windows
    #[error("Temporal covariate data cannot be tidied")]
    TemporalTidy,

    /// Any other invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Input data that breaks the covariate table's invariants.
///
/// Every variant names the identifiers needed to locate the offending
/// records in the source database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// The same `(row_id, covariate_id, time_id)` appears more than once
    #[error("Duplicate row: row {row_id}, covariate {covariate_id}, time {time_id:?}")]
    DuplicateRow {
        /// Row identifier
        row_id: RowId,
        /// Covariate identifier
        covariate_id: CovariateId,
        /// Time window, if temporal
        time_id: Option<TimeId>,
    },

    /// A row references a covariate that is not in the covariate catalog
    #[error("Covariate {covariate_id} (row {row_id}) is missing from the covariate catalog")]
    UnknownCovariate {
        /// Covariate identifier
        covariate_id: CovariateId,
        /// First row that references it
        row_id: RowId,
    },

    /// A covariate references an analysis that is not in the analysis catalog
    #[error("Analysis {analysis_id} (covariate {covariate_id}) is missing from the analysis catalog")]
    UnknownAnalysis {
        /// Analysis identifier
        analysis_id: AnalysisId,
        /// Covariate that references it
        covariate_id: CovariateId,
    },

    /// Two cohorts summarize a covariate under different missing-value strategies
    #[error("Covariate {covariate_id} has a different missing-value strategy in each cohort")]
    AnalysisMismatch {
        /// Covariate identifier
        covariate_id: CovariateId,
    },
}

/// Errors that can occur while reading, validating or writing covariates.
#[derive(Debug, Error)]
pub enum CovariateError {
    /// Invalid settings
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Invalid input data
    #[error("Schema violation: {0}")]
    Schema(#[from] SchemaViolation),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),
}

impl CovariateError {
    /// Whether the error came from invalid settings rather than data.
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether the error came from invalid input data.
    pub const fn is_schema_violation(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}
