//! Non-fatal data-quality findings.

use serde::{Deserialize, Serialize};
use std::fmt;
use tidycov_data::{AnalysisId, CovariateId};

/// A condition that made the pipeline skip an optimization.
///
/// Warnings never abort a run; they are logged and kept in the tidy metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataQualityWarning {
    /// Normalization skipped: the covariate has no strictly positive value
    NonPositiveMaximum {
        /// Covariate left unscaled
        covariate_id: CovariateId,
    },

    /// A binary analysis nearly partitions the cohort but not exactly
    IncompleteGroup {
        /// Analysis that was kept whole
        analysis_id: AnalysisId,
        /// Non-zero values summed over all members
        covered: usize,
        /// Subjects whose member values do not sum to exactly 1
        violating_rows: usize,
        /// Cohort size
        population_size: usize,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveMaximum { covariate_id } => write!(
                f,
                "covariate {} has no positive value; left unnormalized",
                covariate_id
            ),
            Self::IncompleteGroup {
                analysis_id,
                covered,
                violating_rows,
                population_size,
            } => write!(
                f,
                "analysis {} covers {} of {} subjects ({} rows not summing to 1); group kept",
                analysis_id, covered, population_size, violating_rows
            ),
        }
    }
}
