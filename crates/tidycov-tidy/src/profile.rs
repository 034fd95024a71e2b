//! Per-covariate summary gathered in one covariate-scoped pass.
//!
//! Every tidy decision (frequency, normalization factor, constancy, group
//! pre-check) is made from these profiles, so the source rows are scanned
//! once here and once more when writing the result.

use std::collections::BTreeMap;
use tidycov_data::{
    AnalysisId, CovariateId, CovariateRow, CovariateStore, MissingValueStrategy, Progress, Result,
    validate_group,
};

/// What the profile pass learned about one covariate.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateProfile {
    /// Covariate identifier
    pub covariate_id: CovariateId,
    /// Analysis the covariate belongs to
    pub analysis_id: AnalysisId,
    /// Aggregation semantics of that analysis
    pub strategy: MissingValueStrategy,
    /// Rows stored for the covariate
    pub row_count: usize,
    /// Rows with a non-zero value
    pub non_zero_count: usize,
    /// Largest strictly positive value, if any
    pub max_positive: Option<f64>,
    /// The value shared by every stored row, if they all agree
    pub shared_value: Option<f64>,
}

impl CovariateProfile {
    /// Summarize one covariate group.
    pub fn from_rows(
        covariate_id: CovariateId,
        analysis_id: AnalysisId,
        strategy: MissingValueStrategy,
        rows: &[CovariateRow],
    ) -> Self {
        let mut non_zero_count = 0;
        let mut max_positive: Option<f64> = None;
        let mut shared_value = rows.first().map(|r| r.covariate_value);

        for row in rows {
            let value = row.covariate_value;
            if value != 0.0 {
                non_zero_count += 1;
            }
            if value > 0.0 {
                max_positive = Some(max_positive.map_or(value, |m| m.max(value)));
            }
            if shared_value.is_some_and(|shared| shared != value) {
                shared_value = None;
            }
        }

        Self {
            covariate_id,
            analysis_id,
            strategy,
            row_count: rows.len(),
            non_zero_count,
            max_positive,
            shared_value,
        }
    }

    /// Whether every subject of the cohort holds the same value.
    ///
    /// Subjects without a row hold an implicit 0, so a covariate is constant
    /// when all stored values agree and either every subject has a row or
    /// the agreed value is 0.
    pub fn is_constant(&self, population_size: usize) -> bool {
        if population_size == 0 {
            return false;
        }
        match self.shared_value {
            None => self.row_count == 0,
            Some(value) => self.row_count >= population_size || value == 0.0,
        }
    }

    /// Fraction of the population holding a non-zero value.
    pub fn frequency(&self, population_size: usize) -> f64 {
        if population_size == 0 {
            return 0.0;
        }
        self.non_zero_count as f64 / population_size as f64
    }
}

/// Profile every covariate with at least one row, validating each group.
pub fn profile_store<S, P>(store: &S, progress: &P) -> Result<BTreeMap<CovariateId, CovariateProfile>>
where
    S: CovariateStore,
    P: Progress,
{
    let catalog = store.catalog();
    let mut profiles = BTreeMap::new();

    progress.start("profile", Some(store.covariate_count()? as u64));
    store.for_each_covariate(|covariate_id, rows| {
        let strategy = validate_group(catalog, covariate_id, rows)?;
        let analysis_id = catalog
            .covariate(covariate_id)
            .map_or(0, |c| c.analysis_id);
        profiles.insert(
            covariate_id,
            CovariateProfile::from_rows(covariate_id, analysis_id, strategy, rows),
        );
        progress.advance(1);
        Ok(())
    })?;
    progress.finish();

    tracing::debug!(covariates = profiles.len(), "profiled covariates");
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(values: &[f64]) -> CovariateProfile {
        let rows: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| CovariateRow::new(i as i64, 1, *v))
            .collect();
        CovariateProfile::from_rows(1, 1, MissingValueStrategy::ContinuousMissingIsZero, &rows)
    }

    #[test]
    fn test_counts_and_max() {
        let p = profile(&[0.0, 3.0, -1.0, 2.0]);
        assert_eq!(p.row_count, 4);
        assert_eq!(p.non_zero_count, 3);
        assert_eq!(p.max_positive, Some(3.0));
        assert_eq!(p.shared_value, None);
    }

    #[test]
    fn test_no_positive_value() {
        assert_eq!(profile(&[-2.0, -1.0]).max_positive, None);
    }

    #[test]
    fn test_constant_requires_full_coverage_for_non_zero() {
        let p = profile(&[1.0, 1.0, 1.0]);
        assert!(p.is_constant(3));
        assert!(!p.is_constant(4));
    }

    #[test]
    fn test_all_zero_is_constant() {
        assert!(profile(&[0.0, 0.0]).is_constant(10));
    }

    #[test]
    fn test_empty_population_is_never_constant() {
        assert!(!profile(&[1.0]).is_constant(0));
    }
}
