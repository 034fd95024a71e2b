//! Redundancy detector.
//!
//! Two independent passes over the covariates that survived filtering:
//!
//! - **Constant covariates**: every subject holds the same value (absent
//!   subjects count as 0).
//! - **Exhaustive groups**: the binary covariates of one analysis are
//!   mutually exclusive and jointly exhaustive, i.e. their values sum to
//!   exactly 1 for every subject. Any one member is then implied by the
//!   others, so the member with the lowest covariate id is dropped. Only one
//!   member is dropped per group.

use crate::profile::CovariateProfile;
use crate::warning::DataQualityWarning;
use std::collections::{BTreeMap, BTreeSet};
use tidycov_data::{AnalysisId, CovariateId, CovariateStore, Result};

/// Tolerance when checking that a subject's group values sum to 1.
const GROUP_SUM_TOLERANCE: f64 = 1e-9;

/// Relative distance from full coverage at which a group is reported as
/// nearly exhaustive.
const NEAR_MISS_FRACTION: f64 = 0.01;

/// Outcome of the redundancy passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedundancyDecision {
    /// Covariates holding the same value for every subject
    pub constant: BTreeSet<CovariateId>,
    /// One member of each exhaustive binary group
    pub group_members: BTreeSet<CovariateId>,
    /// Groups that nearly qualified
    pub warnings: Vec<DataQualityWarning>,
}

impl RedundancyDecision {
    /// Every covariate id removed for redundancy.
    pub fn removed(&self) -> BTreeSet<CovariateId> {
        self.constant.union(&self.group_members).copied().collect()
    }
}

/// Finds constant covariates and exhaustive binary groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedundancyDetector;

impl RedundancyDetector {
    /// Covariates that are constant across the cohort.
    pub fn constant_covariates(
        &self,
        profiles: &BTreeMap<CovariateId, CovariateProfile>,
        excluded: &BTreeSet<CovariateId>,
        population_size: usize,
    ) -> BTreeSet<CovariateId> {
        profiles
            .values()
            .filter(|p| !excluded.contains(&p.covariate_id))
            .filter(|p| p.is_constant(population_size))
            .map(|p| p.covariate_id)
            .collect()
    }

    /// One member of every binary analysis that partitions the cohort.
    ///
    /// Candidate groups are the surviving covariates of each binary analysis
    /// (at least two). A group whose summed non-zero counts differ from the
    /// population is rejected without touching the rows; otherwise a single
    /// pass grouped by row id checks that each subject's values sum to 1.
    pub fn exhaustive_groups<S: CovariateStore>(
        &self,
        store: &S,
        profiles: &BTreeMap<CovariateId, CovariateProfile>,
        excluded: &BTreeSet<CovariateId>,
        population_size: usize,
    ) -> Result<(BTreeSet<CovariateId>, Vec<DataQualityWarning>)> {
        let mut removed = BTreeSet::new();
        let mut warnings = Vec::new();
        if population_size == 0 {
            return Ok((removed, warnings));
        }

        let mut partitions: BTreeMap<AnalysisId, Vec<&CovariateProfile>> = BTreeMap::new();
        for profile in profiles.values() {
            if profile.strategy.is_binary() && !excluded.contains(&profile.covariate_id) {
                partitions
                    .entry(profile.analysis_id)
                    .or_default()
                    .push(profile);
            }
        }

        for (analysis_id, members) in partitions {
            if members.len() < 2 {
                continue;
            }
            let covered: usize = members.iter().map(|p| p.non_zero_count).sum();
            if covered != population_size {
                let gap = covered.abs_diff(population_size) as f64;
                if gap <= NEAR_MISS_FRACTION * population_size as f64 {
                    warn_incomplete(&mut warnings, analysis_id, covered, 0, population_size);
                }
                continue;
            }

            let member_ids: Vec<CovariateId> = members.iter().map(|p| p.covariate_id).collect();
            let check = check_partition(store, &member_ids)?;
            if check.violating_rows == 0 && check.rows_seen == population_size {
                // members come from a BTreeMap walk, so the first is the lowest id
                let dropped = member_ids[0];
                tracing::debug!(analysis_id, covariate_id = dropped, "exhaustive group");
                removed.insert(dropped);
            } else {
                warn_incomplete(
                    &mut warnings,
                    analysis_id,
                    covered,
                    check.violating_rows,
                    population_size,
                );
            }
        }

        Ok((removed, warnings))
    }

    /// Run both passes.
    pub fn detect<S: CovariateStore>(
        &self,
        store: &S,
        profiles: &BTreeMap<CovariateId, CovariateProfile>,
        excluded: &BTreeSet<CovariateId>,
        population_size: usize,
    ) -> Result<RedundancyDecision> {
        let constant = self.constant_covariates(profiles, excluded, population_size);
        let mut excluded_groups = excluded.clone();
        excluded_groups.extend(constant.iter().copied());
        let (group_members, warnings) =
            self.exhaustive_groups(store, profiles, &excluded_groups, population_size)?;

        Ok(RedundancyDecision {
            constant,
            group_members,
            warnings,
        })
    }
}

#[derive(Debug, Default)]
struct PartitionCheck {
    rows_seen: usize,
    violating_rows: usize,
}

fn check_partition<S: CovariateStore>(
    store: &S,
    member_ids: &[CovariateId],
) -> Result<PartitionCheck> {
    let mut check = PartitionCheck::default();
    store.for_each_row_group(member_ids, |_, rows| {
        let sum: f64 = rows.iter().map(|r| r.covariate_value).sum();
        check.rows_seen += 1;
        if (sum - 1.0).abs() > GROUP_SUM_TOLERANCE {
            check.violating_rows += 1;
        }
        Ok(())
    })?;
    Ok(check)
}

fn warn_incomplete(
    warnings: &mut Vec<DataQualityWarning>,
    analysis_id: AnalysisId,
    covered: usize,
    violating_rows: usize,
    population_size: usize,
) {
    let warning = DataQualityWarning::IncompleteGroup {
        analysis_id,
        covered,
        violating_rows,
        population_size,
    };
    tracing::warn!(analysis_id, "{}", warning);
    warnings.push(warning);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::profile_store;
    use tidycov_data::{
        AnalysisRef, Catalog, CovariateRef, CovariateRow, InMemoryStore, NoProgress,
    };

    fn age_groups(counts: &[(CovariateId, usize)]) -> InMemoryStore {
        let catalog = Catalog::from_refs(
            counts
                .iter()
                .map(|(id, _)| CovariateRef::new(*id, format!("age group {}", id), 3, 0)),
            [AnalysisRef::binary(3, "DemographicsAgeGroup", "Demographics")],
        );
        let mut rows = Vec::new();
        let mut next_row = 0;
        for (id, count) in counts {
            for _ in 0..*count {
                rows.push(CovariateRow::new(next_row, *id, 1.0));
                next_row += 1;
            }
        }
        InMemoryStore::from_rows(catalog, rows)
    }

    fn detect(store: &InMemoryStore, population_size: usize) -> RedundancyDecision {
        let profiles = profile_store(store, &NoProgress).unwrap();
        RedundancyDetector
            .detect(store, &profiles, &BTreeSet::new(), population_size)
            .unwrap()
    }

    #[test]
    fn test_exhaustive_group_drops_lowest_id() {
        let store = age_groups(&[(3003, 5), (1003, 2), (2003, 3)]);
        let decision = detect(&store, 10);
        assert_eq!(decision.group_members, BTreeSet::from([1003]));
        assert!(decision.constant.is_empty());
        assert!(decision.warnings.is_empty());
    }

    #[test]
    fn test_group_missing_subjects_is_kept() {
        let store = age_groups(&[(1003, 2), (2003, 3)]);
        let decision = detect(&store, 10);
        assert!(decision.group_members.is_empty());
    }

    #[test]
    fn test_near_miss_group_warns() {
        let store = age_groups(&[(1003, 300), (2003, 699)]);
        let decision = detect(&store, 1000);
        assert!(decision.group_members.is_empty());
        assert!(matches!(
            decision.warnings.as_slice(),
            [DataQualityWarning::IncompleteGroup {
                analysis_id: 3,
                covered: 999,
                ..
            }]
        ));
    }

    #[test]
    fn test_overlapping_group_is_kept() {
        // subject 0 holds both members, subject 2 holds none
        let catalog = Catalog::from_refs(
            [CovariateRef::new(1, "a", 3, 0), CovariateRef::new(2, "b", 3, 0)],
            [AnalysisRef::binary(3, "x", "Demographics")],
        );
        let store = InMemoryStore::from_rows(
            catalog,
            [
                CovariateRow::new(0, 1, 1.0),
                CovariateRow::new(0, 2, 1.0),
                CovariateRow::new(1, 2, 1.0),
            ],
        );
        let decision = detect(&store, 3);
        assert!(decision.group_members.is_empty());
        assert!(matches!(
            decision.warnings.as_slice(),
            [DataQualityWarning::IncompleteGroup {
                violating_rows: 1,
                ..
            }]
        ));
    }

    #[test]
    fn test_universal_binary_covariate_is_constant() {
        let store = age_groups(&[(1003, 10)]);
        let decision = detect(&store, 10);
        assert_eq!(decision.constant, BTreeSet::from([1003]));
        assert!(decision.group_members.is_empty());
    }

    #[test]
    fn test_empty_cohort_removes_nothing() {
        let store = age_groups(&[]);
        assert_eq!(detect(&store, 0), RedundancyDecision::default());
    }
}
