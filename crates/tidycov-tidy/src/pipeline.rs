//! The composed tidy pipeline.
//!
//! Stage order:
//! 1. profile pass (schema checks, counts, maxima)
//! 2. frequency filter
//! 3. constant and exhaustive-group removal among the survivors
//! 4. normalization factors for what is left
//! 5. write pass: survivors, rescaled, into a fresh sink
//!
//! Redundancy is decided on the raw profiles; both of its tests are
//! unaffected by dividing a column by a positive constant, so the outcome
//! equals running it on normalized values.
//!
//! The source store is only read. A failure in any stage leaves the source
//! untouched and yields no metadata.

use crate::frequency::FrequencyFilter;
use crate::normalize::{NormFactor, Normalization, Normalizer};
use crate::profile::profile_store;
use crate::redundancy::{RedundancyDecision, RedundancyDetector};
use crate::settings::TidySettings;
use crate::warning::DataQualityWarning;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tidycov_data::{
    ConfigurationError, CovariateId, CovariateSink, CovariateStore, InMemoryStore, NoProgress,
    Progress, Result,
};

/// Record of what a tidy run removed and rescaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyMetadata {
    /// Cohort size the decisions were made against
    pub population_size: usize,
    /// Covariates below the frequency threshold, ascending
    pub deleted_infrequent_covariate_ids: Vec<CovariateId>,
    /// Constant covariates and dropped group members, ascending
    pub deleted_redundant_covariate_ids: Vec<CovariateId>,
    /// Divisors applied by the normalizer
    pub norm_factors: Vec<NormFactor>,
    /// Settings of the run
    pub settings: TidySettings,
    /// Optimizations skipped because of data-quality issues
    pub warnings: Vec<DataQualityWarning>,
    /// When the run finished
    pub created_at: DateTime<Utc>,
}

impl TidyMetadata {
    /// Total number of covariates removed.
    pub fn removed_count(&self) -> usize {
        self.deleted_infrequent_covariate_ids.len() + self.deleted_redundant_covariate_ids.len()
    }
}

/// Tidied rows held in memory, with their removal record.
#[derive(Debug, Clone)]
pub struct TidyOutput {
    /// The reduced, rescaled store
    pub store: InMemoryStore,
    /// What was removed and why
    pub metadata: TidyMetadata,
}

/// Filter, normalize and de-duplicate a covariate store.
#[derive(Debug, Clone)]
pub struct TidyPipeline<P = NoProgress> {
    settings: TidySettings,
    progress: P,
}

impl TidyPipeline<NoProgress> {
    /// Create a pipeline.
    ///
    /// # Errors
    /// Returns an error if `min_fraction` is outside (0, 1).
    pub fn new(settings: TidySettings) -> std::result::Result<Self, ConfigurationError> {
        FrequencyFilter::new(settings.min_fraction)?;
        Ok(Self {
            settings,
            progress: NoProgress,
        })
    }

    /// Create a pipeline with default settings.
    pub fn try_default() -> std::result::Result<Self, ConfigurationError> {
        Self::new(TidySettings::default())
    }
}

impl<P: Progress> TidyPipeline<P> {
    /// Report progress to `progress`.
    pub fn with_progress<Q: Progress>(self, progress: Q) -> TidyPipeline<Q> {
        TidyPipeline {
            settings: self.settings,
            progress,
        }
    }

    /// The pipeline's settings.
    pub const fn settings(&self) -> &TidySettings {
        &self.settings
    }

    /// Tidy `store` into `sink`.
    ///
    /// # Arguments
    /// * `store` - Source rows; never modified
    /// * `population_size` - Cohort size, including subjects without rows
    /// * `sink` - Receives the surviving catalog entries and rows
    ///
    /// # Errors
    /// Configuration errors are raised before any row is read; schema
    /// violations abort the run with the offending ids.
    pub fn run<S, K>(&self, store: &S, population_size: usize, sink: &mut K) -> Result<TidyMetadata>
    where
        S: CovariateStore,
        K: CovariateSink,
    {
        self.settings.validate(population_size)?;
        if store.is_temporal()? {
            return Err(ConfigurationError::TemporalTidy.into());
        }
        store.catalog().validate()?;

        tracing::info!(
            population_size,
            min_fraction = self.settings.min_fraction,
            "tidying covariates"
        );

        let profiles = profile_store(store, &self.progress)?;

        let filter = FrequencyFilter::new(self.settings.min_fraction)?;
        let infrequent = filter.removals(store.catalog(), &profiles, population_size);
        tracing::info!(removed = infrequent.len(), "frequency filter");

        let redundancy = if self.settings.remove_redundancy {
            RedundancyDetector.detect(store, &profiles, &infrequent, population_size)?
        } else {
            RedundancyDecision::default()
        };
        let redundant = redundancy.removed();
        tracing::info!(
            constant = redundancy.constant.len(),
            group_members = redundancy.group_members.len(),
            "redundancy detection"
        );

        let removed: BTreeSet<CovariateId> = infrequent.union(&redundant).copied().collect();
        let normalization = if self.settings.normalize {
            Normalizer.factors(&profiles, &removed)
        } else {
            Normalization::default()
        };
        let written = profiles.keys().filter(|id| !removed.contains(id)).count();
        self.write(store, population_size, &removed, &normalization, written, sink)?;

        let mut warnings = normalization.warnings.clone();
        warnings.extend(redundancy.warnings);

        let metadata = TidyMetadata {
            population_size,
            deleted_infrequent_covariate_ids: infrequent.into_iter().collect(),
            deleted_redundant_covariate_ids: redundant.into_iter().collect(),
            norm_factors: normalization.norm_factors(),
            settings: self.settings,
            warnings,
            created_at: Utc::now(),
        };
        tracing::info!(
            removed = metadata.removed_count(),
            normalized = metadata.norm_factors.len(),
            warnings = metadata.warnings.len(),
            "tidy complete"
        );
        Ok(metadata)
    }

    /// Tidy `store` into a new in-memory store.
    pub fn run_in_memory<S: CovariateStore>(
        &self,
        store: &S,
        population_size: usize,
    ) -> Result<TidyOutput> {
        let mut output = InMemoryStore::default();
        let metadata = self.run(store, population_size, &mut output)?;
        Ok(TidyOutput {
            store: output,
            metadata,
        })
    }

    fn write<S, K>(
        &self,
        store: &S,
        population_size: usize,
        removed: &BTreeSet<CovariateId>,
        normalization: &Normalization,
        written: usize,
        sink: &mut K,
    ) -> Result<()>
    where
        S: CovariateStore,
        K: CovariateSink,
    {
        let catalog = store.catalog().retain_covariates(|id| !removed.contains(&id));
        sink.put_catalog(&catalog)?;
        sink.set_population_size(population_size)?;

        self.progress.start("write", Some(written as u64));
        let mut batch = Vec::new();
        store.for_each_covariate(|covariate_id, rows| {
            if removed.contains(&covariate_id) {
                return Ok(());
            }
            batch.clear();
            batch.extend(rows.iter().map(|row| normalization.apply(*row)));
            sink.put_rows(&batch)?;
            self.progress.advance(1);
            Ok(())
        })?;
        self.progress.finish();
        Ok(())
    }
}

/// Tidy a store into memory with the given settings.
pub fn tidy<S: CovariateStore>(
    store: &S,
    population_size: usize,
    settings: TidySettings,
) -> Result<TidyOutput> {
    TidyPipeline::new(settings)?.run_in_memory(store, population_size)
}
