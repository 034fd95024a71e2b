//! Normalizer.
//!
//! Each covariate is divided by its largest strictly positive value, which
//! maps non-negative columns onto [0, 1]. Columns whose maximum is already 1
//! (every binary covariate) are left untouched, which makes the stage
//! idempotent.

use crate::profile::CovariateProfile;
use crate::warning::DataQualityWarning;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tidycov_data::{CovariateId, CovariateRow};

/// Scale applied to one covariate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormFactor {
    /// Covariate identifier
    pub covariate_id: CovariateId,
    /// Observed maximum the values were divided by
    pub max_value: f64,
}

/// Normalization factors for a set of covariates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalization {
    factors: BTreeMap<CovariateId, f64>,
    /// Covariates that could not be normalized
    pub warnings: Vec<DataQualityWarning>,
}

impl Normalization {
    /// The divisor for a covariate, if it is rescaled.
    pub fn factor(&self, covariate_id: CovariateId) -> Option<f64> {
        self.factors.get(&covariate_id).copied()
    }

    /// Rescale one row.
    pub fn apply(&self, row: CovariateRow) -> CovariateRow {
        match self.factor(row.covariate_id) {
            Some(max_value) => row.with_value(row.covariate_value / max_value),
            None => row,
        }
    }

    /// All factors, ordered by covariate id.
    pub fn norm_factors(&self) -> Vec<NormFactor> {
        self.factors
            .iter()
            .map(|(covariate_id, max_value)| NormFactor {
                covariate_id: *covariate_id,
                max_value: *max_value,
            })
            .collect()
    }

    /// Number of covariates rescaled.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Whether no covariate is rescaled.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

/// Computes normalization factors from covariate profiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Factors for every covariate in `profiles` not listed in `removed`.
    pub fn factors(
        &self,
        profiles: &BTreeMap<CovariateId, CovariateProfile>,
        removed: &BTreeSet<CovariateId>,
    ) -> Normalization {
        let mut normalization = Normalization::default();

        for profile in profiles.values() {
            if removed.contains(&profile.covariate_id) {
                continue;
            }
            match profile.max_positive {
                Some(max) if max == 1.0 => {}
                Some(max) => {
                    normalization.factors.insert(profile.covariate_id, max);
                }
                None => {
                    let warning = DataQualityWarning::NonPositiveMaximum {
                        covariate_id: profile.covariate_id,
                    };
                    tracing::warn!(covariate_id = profile.covariate_id, "{}", warning);
                    normalization.warnings.push(warning);
                }
            }
        }

        normalization
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tidycov_data::MissingValueStrategy;

    fn profiles(groups: &[(CovariateId, &[f64])]) -> BTreeMap<CovariateId, CovariateProfile> {
        groups
            .iter()
            .map(|(id, values)| {
                let rows: Vec<_> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| CovariateRow::new(i as i64, *id, *v))
                    .collect();
                (
                    *id,
                    CovariateProfile::from_rows(
                        *id,
                        1,
                        MissingValueStrategy::ContinuousMissingIsZero,
                        &rows,
                    ),
                )
            })
            .collect()
    }

    #[test]
    fn test_divides_by_max() {
        let normalization =
            Normalizer.factors(&profiles(&[(1, &[2.0, 8.0, 4.0])]), &BTreeSet::new());
        let row = normalization.apply(CovariateRow::new(0, 1, 2.0));
        assert_relative_eq!(row.covariate_value, 0.25);
        assert_eq!(
            normalization.norm_factors(),
            vec![NormFactor {
                covariate_id: 1,
                max_value: 8.0
            }]
        );
    }

    #[test]
    fn test_unit_max_is_untouched() {
        let normalization = Normalizer.factors(&profiles(&[(1, &[1.0, 0.5])]), &BTreeSet::new());
        assert!(normalization.is_empty());
    }

    #[test]
    fn test_non_positive_max_warns() {
        let normalization = Normalizer.factors(&profiles(&[(7, &[-3.0, 0.0])]), &BTreeSet::new());
        assert!(normalization.is_empty());
        assert_eq!(
            normalization.warnings,
            vec![DataQualityWarning::NonPositiveMaximum { covariate_id: 7 }]
        );
        let row = CovariateRow::new(0, 7, -3.0);
        assert_eq!(normalization.apply(row), row);
    }

    #[test]
    fn test_removed_covariates_are_skipped() {
        let normalization = Normalizer.factors(
            &profiles(&[(1, &[5.0]), (2, &[-1.0])]),
            &BTreeSet::from([1, 2]),
        );
        assert!(normalization.is_empty());
        assert!(normalization.warnings.is_empty());
    }
}
