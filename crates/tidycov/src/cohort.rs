//! A covariate store bound to the size of the cohort it describes.
//!
//! Every operation of the engine needs both the sparse rows and the number
//! of subjects N (subjects without rows hold implicit zeros). [`Cohort`]
//! keeps the two together so they cannot drift apart.

use std::collections::BTreeSet;
use tidycov_data::{
    ConfigurationError, CovariateSink, CovariateStore, InMemoryStore, Progress, Result, RowId,
    StoreSummary, filter_by_row_ids,
};
use tidycov_stats::{
    AggregatedCovariates, Aggregator, StandardizedDifferenceReport,
    compute_standardized_difference,
};
use tidycov_tidy::{TidyMetadata, TidyPipeline, TidySettings};

/// A store together with its population size.
#[derive(Debug, Clone)]
pub struct Cohort<S> {
    store: S,
    population_size: usize,
}

impl<S: CovariateStore> Cohort<S> {
    /// Bind a store to an explicit population size.
    pub const fn new(store: S, population_size: usize) -> Self {
        Self {
            store,
            population_size,
        }
    }

    /// Bind a store to the population size recorded in its metadata.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::MissingPopulation`] when the store does
    /// not record one.
    pub fn from_store(store: S) -> Result<Self> {
        let population_size = store
            .population_size()
            .ok_or(ConfigurationError::MissingPopulation)?;
        Ok(Self::new(store, population_size))
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Number of subjects, including those without rows.
    pub const fn population_size(&self) -> usize {
        self.population_size
    }

    /// Release the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Counts describing the stored table.
    pub fn summary(&self) -> Result<StoreSummary> {
        self.store.summary()
    }

    /// Tidy into a new in-memory cohort.
    pub fn tidy(&self, settings: TidySettings) -> Result<(Cohort<InMemoryStore>, TidyMetadata)> {
        let output = TidyPipeline::new(settings)?.run_in_memory(&self.store, self.population_size)?;
        Ok((
            Cohort::new(output.store, self.population_size),
            output.metadata,
        ))
    }

    /// Tidy into `sink`, reporting progress.
    pub fn tidy_into<K, P>(
        &self,
        settings: TidySettings,
        sink: &mut K,
        progress: P,
    ) -> Result<TidyMetadata>
    where
        K: CovariateSink,
        P: Progress,
    {
        TidyPipeline::new(settings)?
            .with_progress(progress)
            .run(&self.store, self.population_size, sink)
    }

    /// Population statistics of every covariate.
    pub fn aggregate(&self) -> Result<AggregatedCovariates> {
        Aggregator::new().aggregate(&self.store, self.population_size)
    }

    /// Population statistics, reporting progress.
    pub fn aggregate_with_progress<P: Progress>(&self, progress: P) -> Result<AggregatedCovariates> {
        Aggregator::new()
            .with_progress(progress)
            .aggregate(&self.store, self.population_size)
    }

    /// Standardized differences against `comparator`.
    pub fn compare<T: CovariateStore>(
        &self,
        comparator: &Cohort<T>,
    ) -> Result<StandardizedDifferenceReport> {
        compute_standardized_difference(&self.aggregate()?, &comparator.aggregate()?)
    }

    /// The sub-cohort made of `row_ids`.
    ///
    /// Its population size is the number of selected ids.
    pub fn subset(&self, row_ids: &BTreeSet<RowId>) -> Result<Cohort<InMemoryStore>> {
        let mut store = InMemoryStore::default();
        filter_by_row_ids(&self.store, row_ids, &mut store)?;
        Ok(Cohort::new(store, row_ids.len()))
    }
}
