//! Population-level summaries of a sparse covariate store.
//!
//! Every covariate (and, for temporal data, every time window of it) becomes
//! one record. The analysis of the covariate selects the summary:
//!
//! | strategy                     | distribution over                     |
//! |------------------------------|---------------------------------------|
//! | `Binary`                     | count of non-zero rows out of N       |
//! | `ContinuousMissingIsZero`    | all N subjects, absent ones as 0      |
//! | `ContinuousMissingIsAbsent`  | only the subjects with a row          |
//!
//! `count_value` is always the number of subjects with an explicit row.

use crate::quantile::SparseSample;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tidycov_data::{
    AnalysisId, Catalog, ConfigurationError, CovariateId, CovariateRow, CovariateStore,
    InMemoryStore, MissingValueStrategy, NoProgress, Progress, Result, TimeId, validate_group,
};

/// Summary of a binary covariate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBinary {
    /// Covariate identifier
    pub covariate_id: CovariateId,
    /// Time window, for temporal data
    pub time_id: Option<TimeId>,
    /// Analysis of the covariate
    pub analysis_id: AnalysisId,
    /// Subjects holding the covariate
    pub sum_value: u64,
    /// `sum_value / N`
    pub average_value: f64,
}

impl AggregatedBinary {
    /// Bernoulli variance `p(1 - p)`.
    pub fn variance(&self) -> f64 {
        self.average_value * (1.0 - self.average_value)
    }
}

/// Distributional summary of a continuous covariate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedContinuous {
    /// Covariate identifier
    pub covariate_id: CovariateId,
    /// Time window, for temporal data
    pub time_id: Option<TimeId>,
    /// Analysis of the covariate
    pub analysis_id: AnalysisId,
    /// Subjects with an explicit row
    pub count_value: u64,
    /// Minimum
    pub min_value: f64,
    /// Maximum
    pub max_value: f64,
    /// Mean
    pub average_value: f64,
    /// Sample standard deviation
    pub standard_deviation: f64,
    /// Median
    pub median_value: f64,
    /// 10th percentile
    pub p10_value: f64,
    /// 25th percentile
    pub p25_value: f64,
    /// 75th percentile
    pub p75_value: f64,
    /// 90th percentile
    pub p90_value: f64,
}

impl AggregatedContinuous {
    /// Summarize sorted explicit values plus `zeros` implicit zeros.
    ///
    /// Returns `None` when the sample is empty.
    fn from_sample(
        covariate_id: CovariateId,
        time_id: Option<TimeId>,
        analysis_id: AnalysisId,
        sample: SparseSample<'_>,
        count_value: u64,
    ) -> Option<Self> {
        let (average_value, standard_deviation) = sample.mean_and_sd()?;
        Some(Self {
            covariate_id,
            time_id,
            analysis_id,
            count_value,
            min_value: sample.min()?,
            max_value: sample.max()?,
            average_value,
            standard_deviation,
            median_value: sample.quantile(0.5)?,
            p10_value: sample.quantile(0.1)?,
            p25_value: sample.quantile(0.25)?,
            p75_value: sample.quantile(0.75)?,
            p90_value: sample.quantile(0.9)?,
        })
    }

    /// Variance `sd²`.
    pub fn variance(&self) -> f64 {
        self.standard_deviation * self.standard_deviation
    }
}

/// Aggregated statistics of one cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCovariates {
    /// Cohort size the averages are taken over
    pub population_size: usize,
    /// Binary covariates, ordered by `(covariate_id, time_id)`
    pub binary: Vec<AggregatedBinary>,
    /// Continuous covariates, ordered by `(covariate_id, time_id)`
    pub continuous: Vec<AggregatedContinuous>,
    /// Covariate and analysis definitions
    pub catalog: Catalog,
}

impl AggregatedCovariates {
    /// Number of records in both tables.
    pub fn len(&self) -> usize {
        self.binary.len() + self.continuous.len()
    }

    /// Whether both tables are empty.
    pub fn is_empty(&self) -> bool {
        self.binary.is_empty() && self.continuous.is_empty()
    }

    /// Name of a covariate, or an empty string when it is not catalogued.
    pub fn covariate_name(&self, covariate_id: CovariateId) -> &str {
        self.catalog
            .covariate(covariate_id)
            .map_or("", |c| c.covariate_name.as_str())
    }

    /// Binary table as a DataFrame.
    ///
    /// Columns: `covariate_id`, `time_id`, `covariate_name`, `sum_value`,
    /// `average_value`.
    pub fn binary_frame(&self) -> Result<DataFrame> {
        let names: Vec<&str> = self
            .binary
            .iter()
            .map(|b| self.covariate_name(b.covariate_id))
            .collect();
        let df = DataFrame::new(vec![
            Series::new(
                "covariate_id".into(),
                self.binary.iter().map(|b| b.covariate_id).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "time_id".into(),
                self.binary.iter().map(|b| b.time_id).collect::<Vec<_>>(),
            )
            .into(),
            Series::new("covariate_name".into(), names).into(),
            Series::new(
                "sum_value".into(),
                self.binary.iter().map(|b| b.sum_value).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "average_value".into(),
                self.binary.iter().map(|b| b.average_value).collect::<Vec<_>>(),
            )
            .into(),
        ])?;
        Ok(df)
    }

    /// Continuous table as a DataFrame, one column per statistic.
    pub fn continuous_frame(&self) -> Result<DataFrame> {
        let rows = &self.continuous;
        let column = |name: &str, f: fn(&AggregatedContinuous) -> f64| -> Column {
            Series::new(name.into(), rows.iter().map(f).collect::<Vec<_>>()).into()
        };
        let names: Vec<&str> = rows
            .iter()
            .map(|c| self.covariate_name(c.covariate_id))
            .collect();

        let df = DataFrame::new(vec![
            Series::new(
                "covariate_id".into(),
                rows.iter().map(|c| c.covariate_id).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "time_id".into(),
                rows.iter().map(|c| c.time_id).collect::<Vec<_>>(),
            )
            .into(),
            Series::new("covariate_name".into(), names).into(),
            Series::new(
                "count_value".into(),
                rows.iter().map(|c| c.count_value).collect::<Vec<_>>(),
            )
            .into(),
            column("min_value", |c| c.min_value),
            column("max_value", |c| c.max_value),
            column("average_value", |c| c.average_value),
            column("standard_deviation", |c| c.standard_deviation),
            column("median_value", |c| c.median_value),
            column("p10_value", |c| c.p10_value),
            column("p25_value", |c| c.p25_value),
            column("p75_value", |c| c.p75_value),
            column("p90_value", |c| c.p90_value),
        ])?;
        Ok(df)
    }
}

/// Collapses per-subject rows into population statistics.
#[derive(Debug, Clone, Default)]
pub struct Aggregator<P = NoProgress> {
    progress: P,
}

impl Aggregator<NoProgress> {
    /// Create an aggregator without progress reporting.
    pub const fn new() -> Self {
        Self {
            progress: NoProgress,
        }
    }
}

impl<P: Progress> Aggregator<P> {
    /// Report progress to `progress`.
    pub fn with_progress<Q: Progress>(self, progress: Q) -> Aggregator<Q> {
        Aggregator { progress }
    }

    /// Aggregate every covariate of `store`.
    ///
    /// # Arguments
    /// * `store` - Source rows; one covariate group is held at a time
    /// * `population_size` - Cohort size N, including subjects without rows
    ///
    /// # Errors
    /// Fails on schema violations, or when N is 0 for a store that has rows.
    pub fn aggregate<S: CovariateStore>(
        &self,
        store: &S,
        population_size: usize,
    ) -> Result<AggregatedCovariates> {
        if population_size == 0 && store.row_count()? > 0 {
            return Err(ConfigurationError::EmptyPopulation.into());
        }
        let catalog = store.catalog();
        catalog.validate()?;
        tracing::info!(population_size, "aggregating covariates");

        let mut binary = Vec::new();
        let mut continuous = Vec::new();
        let mut values = Vec::new();

        self.progress
            .start("aggregate", Some(store.covariate_count()? as u64));
        store.for_each_covariate(|covariate_id, rows| {
            let strategy = validate_group(catalog, covariate_id, rows)?;
            let analysis_id = catalog
                .covariate(covariate_id)
                .map_or(0, |c| c.analysis_id);

            for window in rows.chunk_by(|a, b| a.time_id == b.time_id) {
                let time_id = window.first().and_then(|r| r.time_id);
                match strategy {
                    MissingValueStrategy::Binary => binary.push(aggregate_binary(
                        covariate_id,
                        time_id,
                        analysis_id,
                        window,
                        population_size,
                    )),
                    MissingValueStrategy::ContinuousMissingIsZero
                    | MissingValueStrategy::ContinuousMissingIsAbsent => {
                        values.clear();
                        values.extend(window.iter().map(|r| r.covariate_value));
                        values.sort_unstable_by(f64::total_cmp);
                        let zeros = if strategy.absent_is_zero() {
                            if window.len() > population_size {
                                tracing::warn!(
                                    covariate_id,
                                    rows = window.len(),
                                    population_size,
                                    "more rows than subjects"
                                );
                            }
                            population_size.saturating_sub(window.len())
                        } else {
                            0
                        };
                        let sample = SparseSample::new(&values, zeros);
                        continuous.extend(AggregatedContinuous::from_sample(
                            covariate_id,
                            time_id,
                            analysis_id,
                            sample,
                            window.len() as u64,
                        ));
                    }
                }
            }
            self.progress.advance(1);
            Ok(())
        })?;
        self.progress.finish();

        tracing::info!(
            binary = binary.len(),
            continuous = continuous.len(),
            "aggregation complete"
        );
        Ok(AggregatedCovariates {
            population_size,
            binary,
            continuous,
            catalog: catalog.clone(),
        })
    }
}

fn aggregate_binary(
    covariate_id: CovariateId,
    time_id: Option<TimeId>,
    analysis_id: AnalysisId,
    rows: &[CovariateRow],
    population_size: usize,
) -> AggregatedBinary {
    let sum_value = rows.iter().filter(|r| r.covariate_value != 0.0).count() as u64;
    let average_value = if population_size == 0 {
        0.0
    } else {
        sum_value as f64 / population_size as f64
    };
    AggregatedBinary {
        covariate_id,
        time_id,
        analysis_id,
        sum_value,
        average_value,
    }
}

/// Aggregate a store.
pub fn aggregate<S: CovariateStore>(
    store: &S,
    population_size: usize,
) -> Result<AggregatedCovariates> {
    Aggregator::new().aggregate(store, population_size)
}

/// Aggregate rows that were never stored per subject.
///
/// The rows may arrive in any order; they are grouped in memory first.
pub fn aggregate_rows<I>(rows: I, catalog: Catalog, population_size: usize) -> Result<AggregatedCovariates>
where
    I: IntoIterator<Item = CovariateRow>,
{
    let store = InMemoryStore::from_rows(catalog, rows);
    aggregate(&store, population_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tidycov_data::{AnalysisRef, CovariateRef};

    fn catalog() -> Catalog {
        Catalog::from_refs(
            [
                CovariateRef::new(1, "hypertension", 10, 316866),
                CovariateRef::new(2, "BMI", 20, 0),
                CovariateRef::new(3, "Charlson index", 30, 0),
            ],
            [
                AnalysisRef::binary(10, "ConditionOccurrence", "Condition"),
                AnalysisRef::continuous(20, "MeasurementValue", "Measurement", false),
                AnalysisRef::continuous(30, "CharlsonIndex", "Condition", true),
            ],
        )
    }

    fn rows() -> Vec<CovariateRow> {
        vec![
            CovariateRow::new(4, 2, 6.0),
            CovariateRow::new(0, 1, 1.0),
            CovariateRow::new(1, 2, 2.0),
            CovariateRow::new(2, 1, 1.0),
            CovariateRow::new(2, 2, 4.0),
            CovariateRow::new(5, 1, 1.0),
            CovariateRow::new(0, 3, 2.0),
            CovariateRow::new(1, 3, 4.0),
            CovariateRow::new(2, 3, 6.0),
        ]
    }

    #[derive(Default)]
    struct Counted {
        total: std::cell::Cell<Option<u64>>,
        advanced: std::cell::Cell<u64>,
    }

    impl Progress for Counted {
        fn start(&self, _stage: &str, total: Option<u64>) {
            self.total.set(total);
        }

        fn advance(&self, count: u64) {
            self.advanced.set(self.advanced.get() + count);
        }
    }

    #[test]
    fn test_progress_total_counts_covariates_with_rows() {
        let mut catalog = catalog();
        catalog.insert_covariate(CovariateRef::new(4, "never measured", 20, 0));
        let store = InMemoryStore::from_rows(catalog, rows());

        let counted = Counted::default();
        Aggregator::new()
            .with_progress(&counted)
            .aggregate(&store, 10)
            .unwrap();
        assert_eq!(counted.total.get(), Some(3));
        assert_eq!(counted.advanced.get(), 3);
    }

    #[test]
    fn test_binary_sum_and_average() {
        let result = aggregate_rows(rows(), catalog(), 10).unwrap();
        assert_eq!(result.binary.len(), 1);
        assert_eq!(result.binary[0].sum_value, 3);
        assert_relative_eq!(result.binary[0].average_value, 0.3);
    }

    #[test]
    fn test_missing_is_absent_uses_explicit_rows() {
        let result = aggregate_rows(rows(), catalog(), 10).unwrap();
        let bmi = &result.continuous[0];
        assert_eq!(bmi.covariate_id, 2);
        assert_eq!(bmi.count_value, 3);
        assert_relative_eq!(bmi.min_value, 2.0);
        assert_relative_eq!(bmi.max_value, 6.0);
        assert_relative_eq!(bmi.average_value, 4.0);
        assert_relative_eq!(bmi.standard_deviation, 2.0);
        assert_relative_eq!(bmi.median_value, 4.0);
        assert_relative_eq!(bmi.p25_value, 3.0);
    }

    #[test]
    fn test_missing_is_zero_counts_every_subject() {
        let result = aggregate_rows(rows(), catalog(), 10).unwrap();
        let charlson = &result.continuous[1];
        assert_eq!(charlson.covariate_id, 3);
        assert_eq!(charlson.count_value, 3);
        assert_relative_eq!(charlson.min_value, 0.0);
        assert_relative_eq!(charlson.max_value, 6.0);
        assert_relative_eq!(charlson.average_value, 1.2);
        assert_relative_eq!(charlson.median_value, 0.0);
        // sorted: seven zeros, 2, 4, 6; h = 8.1
        assert_relative_eq!(charlson.p90_value, 4.2, epsilon = 1e-12);
    }

    #[test]
    fn test_temporal_windows_are_separate() {
        let rows = [
            CovariateRow::temporal(0, 1, 1, 1.0),
            CovariateRow::temporal(1, 1, 1, 1.0),
            CovariateRow::temporal(0, 1, 2, 1.0),
        ];
        let result = aggregate_rows(rows, catalog(), 4).unwrap();
        let sums: Vec<_> = result
            .binary
            .iter()
            .map(|b| (b.time_id, b.sum_value))
            .collect();
        assert_eq!(sums, vec![(Some(1), 2), (Some(2), 1)]);
    }

    #[test]
    fn test_empty_population_is_rejected() {
        let err = aggregate_rows(rows(), catalog(), 0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_frames() {
        let result = aggregate_rows(rows(), catalog(), 10).unwrap();
        let binary = result.binary_frame().unwrap();
        assert_eq!(binary.height(), 1);
        assert_eq!(binary.width(), 5);
        let continuous = result.continuous_frame().unwrap();
        assert_eq!(continuous.height(), 2);
        assert_eq!(continuous.width(), 13);
    }
}
