//! Frequency filter.
//!
//! A covariate survives when the fraction of the population holding a
//! non-zero value is at least `min_fraction`. The comparison is strict on the
//! removal side: `count / N < min_fraction` removes, so a covariate sitting
//! exactly on the threshold is kept.

use crate::profile::CovariateProfile;
use std::collections::{BTreeMap, BTreeSet};
use tidycov_data::{Catalog, ConfigurationError, CovariateId};

/// Removes covariates held by too small a fraction of the cohort.
#[derive(Debug, Clone, Copy)]
pub struct FrequencyFilter {
    min_fraction: f64,
}

impl FrequencyFilter {
    /// Create a filter; `min_fraction` must lie in (0, 1).
    pub fn new(min_fraction: f64) -> Result<Self, ConfigurationError> {
        if !(min_fraction > 0.0 && min_fraction < 1.0) {
            return Err(ConfigurationError::InvalidMinFraction(min_fraction));
        }
        Ok(Self { min_fraction })
    }

    /// The configured threshold.
    pub const fn min_fraction(&self) -> f64 {
        self.min_fraction
    }

    /// Whether a covariate with `count` non-zero subjects is kept.
    pub fn retains(&self, count: usize, population_size: usize) -> bool {
        population_size == 0 || count as f64 / population_size as f64 >= self.min_fraction
    }

    /// Covariate ids to remove.
    ///
    /// Catalogued covariates without any row count as zero occurrences and
    /// are removed too. An empty population removes nothing.
    pub fn removals(
        &self,
        catalog: &Catalog,
        profiles: &BTreeMap<CovariateId, CovariateProfile>,
        population_size: usize,
    ) -> BTreeSet<CovariateId> {
        if population_size == 0 {
            return BTreeSet::new();
        }

        let catalogued = catalog.covariates().map(|c| c.covariate_id);
        let profiled = profiles.keys().copied();
        let candidates: BTreeSet<CovariateId> = catalogued.chain(profiled).collect();

        candidates
            .into_iter()
            .filter(|id| {
                let count = profiles.get(id).map_or(0, |p| p.non_zero_count);
                !self.retains(count, population_size)
            })
            .collect()
    }
}

impl Default for FrequencyFilter {
    fn default() -> Self {
        Self {
            min_fraction: crate::settings::DEFAULT_MIN_FRACTION,
        }
    }
}
