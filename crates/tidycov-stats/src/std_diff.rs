//! Standardized mean difference between two aggregated cohorts.
//!
//! For every covariate (and time window) in either cohort:
//!
//! ```text
//! d = (mean1 - mean2) / sqrt((var1 + var2) / 2)
//! ```
//!
//! Binary variance is `p(1 - p)`, continuous variance is `sd²`. A covariate
//! missing from one cohort reads as mean 0 and variance 0 on that side,
//! except under an analysis where absence means "not measured"; such
//! covariates are listed as non-comparable instead.

use crate::aggregate::AggregatedCovariates;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tidycov_data::{
    AnalysisId, CovariateId, MissingValueStrategy, Result, SchemaViolation, TimeId,
};

/// One row of the comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedDifference {
    /// Covariate identifier
    pub covariate_id: CovariateId,
    /// Time window, for temporal data
    pub time_id: Option<TimeId>,
    /// Covariate name from either cohort's catalog
    pub covariate_name: String,
    /// Mean in the target cohort
    pub mean_value1: f64,
    /// Mean in the comparator cohort
    pub mean_value2: f64,
    /// Standardized difference
    pub std_diff: f64,
}

/// Why a covariate was left out of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonComparableReason {
    /// Present in one cohort only, and absence means "not measured"
    MissingIsAbsent,
}

impl fmt::Display for NonComparableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIsAbsent => f.write_str("present in one cohort only; missing is absent"),
        }
    }
}

/// A covariate excluded from the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonComparable {
    /// Covariate identifier
    pub covariate_id: CovariateId,
    /// Time window, for temporal data
    pub time_id: Option<TimeId>,
    /// Reason for exclusion
    pub reason: NonComparableReason,
}

/// Comparison of two cohorts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardizedDifferenceReport {
    /// Comparable covariates, by `|std_diff|` descending
    pub records: Vec<StandardizedDifference>,
    /// Covariates that could not be compared
    pub non_comparable: Vec<NonComparable>,
}

impl StandardizedDifferenceReport {
    /// The `n` largest differences.
    pub fn top(&self, n: usize) -> &[StandardizedDifference] {
        &self.records[..n.min(self.records.len())]
    }

    /// Records whose absolute difference reaches `threshold`.
    ///
    /// 0.1 is the customary balance threshold.
    pub fn imbalanced(&self, threshold: f64) -> impl Iterator<Item = &StandardizedDifference> {
        self.records
            .iter()
            .take_while(move |r| r.std_diff.abs() >= threshold)
    }
}

#[derive(Debug, Clone, Copy)]
struct Moments {
    strategy: MissingValueStrategy,
    mean: f64,
    variance: f64,
}

type Key = (CovariateId, Option<TimeId>);

fn strategy_of(
    cohort: &AggregatedCovariates,
    covariate_id: CovariateId,
    analysis_id: AnalysisId,
) -> std::result::Result<MissingValueStrategy, SchemaViolation> {
    cohort
        .catalog
        .analysis(analysis_id)
        .map(|a| a.strategy())
        .ok_or(SchemaViolation::UnknownAnalysis {
            analysis_id,
            covariate_id,
        })
}

fn moments(cohort: &AggregatedCovariates) -> Result<BTreeMap<Key, Moments>> {
    let mut map = BTreeMap::new();
    for b in &cohort.binary {
        map.insert(
            (b.covariate_id, b.time_id),
            Moments {
                strategy: MissingValueStrategy::Binary,
                mean: b.average_value,
                variance: b.variance(),
            },
        );
    }
    for c in &cohort.continuous {
        map.insert(
            (c.covariate_id, c.time_id),
            Moments {
                strategy: strategy_of(cohort, c.covariate_id, c.analysis_id)?,
                mean: c.average_value,
                variance: c.variance(),
            },
        );
    }
    Ok(map)
}

/// `(mean1 - mean2) / sqrt((var1 + var2) / 2)`, 0 when the pooled deviation is 0.
pub fn standardized_difference(mean1: f64, var1: f64, mean2: f64, var2: f64) -> f64 {
    let pooled_sd = ((var1 + var2) / 2.0).sqrt();
    if pooled_sd == 0.0 {
        0.0
    } else {
        (mean1 - mean2) / pooled_sd
    }
}

/// Compare a target cohort with a comparator cohort.
///
/// # Errors
/// Returns [`SchemaViolation::AnalysisMismatch`] when the cohorts summarize a
/// covariate under different missing-value strategies.
pub fn compute_standardized_difference(
    target: &AggregatedCovariates,
    comparator: &AggregatedCovariates,
) -> Result<StandardizedDifferenceReport> {
    let first = moments(target)?;
    let second = moments(comparator)?;
    let absent = |strategy| Moments {
        strategy,
        mean: 0.0,
        variance: 0.0,
    };

    let mut keys: Vec<Key> = first.keys().chain(second.keys()).copied().collect();
    keys.sort_unstable();
    keys.dedup();

    let mut report = StandardizedDifferenceReport::default();
    for key @ (covariate_id, time_id) in keys {
        let (m1, m2) = match (first.get(&key), second.get(&key)) {
            (Some(a), Some(b)) => {
                if a.strategy != b.strategy {
                    return Err(SchemaViolation::AnalysisMismatch { covariate_id }.into());
                }
                (*a, *b)
            }
            (Some(present), None) | (None, Some(present))
                if !present.strategy.absent_is_zero() =>
            {
                tracing::debug!(covariate_id, "covariate present in one cohort only");
                report.non_comparable.push(NonComparable {
                    covariate_id,
                    time_id,
                    reason: NonComparableReason::MissingIsAbsent,
                });
                continue;
            }
            (Some(a), None) => (*a, absent(a.strategy)),
            (None, Some(b)) => (absent(b.strategy), *b),
            (None, None) => continue,
        };

        let covariate_name = match target.covariate_name(covariate_id) {
            "" => comparator.covariate_name(covariate_id),
            name => name,
        };
        report.records.push(StandardizedDifference {
            covariate_id,
            time_id,
            covariate_name: covariate_name.to_string(),
            mean_value1: m1.mean,
            mean_value2: m2.mean,
            std_diff: standardized_difference(m1.mean, m1.variance, m2.mean, m2.variance),
        });
    }

    report.records.sort_by(|a, b| {
        b.std_diff
            .abs()
            .total_cmp(&a.std_diff.abs())
            .then_with(|| (a.covariate_id, a.time_id).cmp(&(b.covariate_id, b.time_id)))
    });
    tracing::info!(
        compared = report.records.len(),
        non_comparable = report.non_comparable.len(),
        "standardized differences computed"
    );
    Ok(report)
}
