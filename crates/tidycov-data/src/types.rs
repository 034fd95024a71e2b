//! Row and reference types of the sparse covariate table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one cohort entry (subject, optionally per entry).
pub type RowId = i64;

/// Identifier of a covariate definition.
pub type CovariateId = i64;

/// Identifier of an analysis (a family of covariates).
pub type AnalysisId = i32;

/// Identifier of a time window for temporal covariates.
pub type TimeId = i32;

/// One non-zero (or explicitly recorded) cell of the sparse matrix.
///
/// Subjects without a row for a covariate implicitly hold `0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CovariateRow {
    /// Cohort entry
    pub row_id: RowId,
    /// Covariate definition
    pub covariate_id: CovariateId,
    /// Time window (temporal covariates only)
    #[serde(default)]
    pub time_id: Option<TimeId>,
    /// Recorded value
    pub covariate_value: f64,
}

impl CovariateRow {
    /// Create a non-temporal row.
    pub const fn new(row_id: RowId, covariate_id: CovariateId, covariate_value: f64) -> Self {
        Self {
            row_id,
            covariate_id,
            time_id: None,
            covariate_value,
        }
    }

    /// Create a row within a time window.
    pub const fn temporal(
        row_id: RowId,
        covariate_id: CovariateId,
        time_id: TimeId,
        covariate_value: f64,
    ) -> Self {
        Self {
            row_id,
            covariate_id,
            time_id: Some(time_id),
            covariate_value,
        }
    }

    /// Same row with a different value.
    pub const fn with_value(self, covariate_value: f64) -> Self {
        Self {
            covariate_value,
            ..self
        }
    }

    /// Ordering key used by every store within a covariate group.
    pub const fn group_key(&self) -> (Option<TimeId>, RowId) {
        (self.time_id, self.row_id)
    }
}

/// Covariate catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateRef {
    /// Covariate identifier
    pub covariate_id: CovariateId,
    /// Human readable name, e.g. "age group: 5-9"
    pub covariate_name: String,
    /// Analysis the covariate belongs to
    pub analysis_id: AnalysisId,
    /// Concept the covariate was derived from (0 when none)
    pub concept_id: i64,
}

impl CovariateRef {
    /// Create a catalog entry.
    pub fn new(
        covariate_id: CovariateId,
        covariate_name: impl Into<String>,
        analysis_id: AnalysisId,
        concept_id: i64,
    ) -> Self {
        Self {
            covariate_id,
            covariate_name: covariate_name.into(),
            analysis_id,
            concept_id,
        }
    }
}

/// How absent rows are interpreted when summarizing an analysis.
///
/// Derived from an [`AnalysisRef`]; every aggregation path dispatches on
/// this instead of reading the raw flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingValueStrategy {
    /// 0/1 indicators; absent means 0
    Binary,
    /// Continuous values; absent subjects contribute a real 0
    ContinuousMissingIsZero,
    /// Continuous values; absent subjects are excluded from the distribution
    ContinuousMissingIsAbsent,
}

impl MissingValueStrategy {
    /// Whether the covariates are 0/1 indicators.
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary)
    }

    /// Whether a subject without a row may be read as holding 0.
    pub const fn absent_is_zero(&self) -> bool {
        !matches!(self, Self::ContinuousMissingIsAbsent)
    }
}

impl fmt::Display for MissingValueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Binary => "binary",
            Self::ContinuousMissingIsZero => "continuous (missing = 0)",
            Self::ContinuousMissingIsAbsent => "continuous (missing = absent)",
        };
        f.write_str(label)
    }
}

/// Analysis catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRef {
    /// Analysis identifier
    pub analysis_id: AnalysisId,
    /// Analysis name, e.g. "DemographicsAgeGroup"
    pub analysis_name: String,
    /// Clinical domain, e.g. "Demographics"
    pub domain_id: String,
    /// Covariates only take values 0 and 1
    pub is_binary: bool,
    /// Absent rows mean the value is 0 (continuous analyses)
    pub missing_means_zero: bool,
}

impl AnalysisRef {
    /// A binary analysis.
    pub fn binary(
        analysis_id: AnalysisId,
        analysis_name: impl Into<String>,
        domain_id: impl Into<String>,
    ) -> Self {
        Self {
            analysis_id,
            analysis_name: analysis_name.into(),
            domain_id: domain_id.into(),
            is_binary: true,
            missing_means_zero: true,
        }
    }

    /// A continuous analysis.
    pub fn continuous(
        analysis_id: AnalysisId,
        analysis_name: impl Into<String>,
        domain_id: impl Into<String>,
        missing_means_zero: bool,
    ) -> Self {
        Self {
            analysis_id,
            analysis_name: analysis_name.into(),
            domain_id: domain_id.into(),
            is_binary: false,
            missing_means_zero,
        }
    }

    /// Aggregation semantics for this analysis.
    pub const fn strategy(&self) -> MissingValueStrategy {
        match (self.is_binary, self.missing_means_zero) {
            (true, _) => MissingValueStrategy::Binary,
            (false, true) => MissingValueStrategy::ContinuousMissingIsZero,
            (false, false) => MissingValueStrategy::ContinuousMissingIsAbsent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            AnalysisRef::binary(1, "AgeGroup", "Demographics").strategy(),
            MissingValueStrategy::Binary
        );
        assert_eq!(
            AnalysisRef::continuous(2, "Charlson", "Condition", true).strategy(),
            MissingValueStrategy::ContinuousMissingIsZero
        );
        assert_eq!(
            AnalysisRef::continuous(3, "Measurement", "Measurement", false).strategy(),
            MissingValueStrategy::ContinuousMissingIsAbsent
        );
    }

    #[test]
    fn test_binary_ignores_missing_flag() {
        let mut analysis = AnalysisRef::binary(1, "Gender", "Demographics");
        analysis.missing_means_zero = false;
        assert!(analysis.strategy().is_binary());
        assert!(analysis.strategy().absent_is_zero());
    }

    #[test]
    fn test_group_key_orders_by_time_then_row() {
        let a = CovariateRow::temporal(5, 1, 1, 1.0);
        let b = CovariateRow::temporal(2, 1, 2, 1.0);
        assert!(a.group_key() < b.group_key());
        assert!(CovariateRow::new(9, 1, 1.0).group_key() < a.group_key());
    }
}
