//! Aggregation and comparison over both store backends.

use approx::assert_relative_eq;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rstest::rstest;
use tidycov_data::{
    AnalysisRef, Catalog, CovariateRef, CovariateRow, InMemoryStore, SqliteStore, copy_into,
};
use tidycov_stats::{
    AggregatedCovariates, Aggregator, aggregate, aggregate_rows, compute_standardized_difference,
};

fn catalog(missing_means_zero: bool) -> Catalog {
    Catalog::from_refs(
        [
            CovariateRef::new(8507001, "gender = MALE", 1, 8507),
            CovariateRef::new(3004410703, "HbA1c", 703, 3004410),
        ],
        [
            AnalysisRef::binary(1, "DemographicsGender", "Demographics"),
            AnalysisRef::continuous(703, "MeasurementValue", "Measurement", missing_means_zero),
        ],
    )
}

fn measurement(values: &[(i64, f64)]) -> Vec<CovariateRow> {
    values
        .iter()
        .map(|(row_id, v)| CovariateRow::new(*row_id, 3004410703, *v))
        .collect()
}

#[test]
fn test_three_of_ten_subjects() {
    let rows = measurement(&[(7, 6.0), (1, 2.0), (4, 4.0)]);
    let result = aggregate_rows(rows, catalog(false), 10).unwrap();
    let hba1c = &result.continuous[0];

    assert_eq!(hba1c.count_value, 3);
    assert_relative_eq!(hba1c.min_value, 2.0);
    assert_relative_eq!(hba1c.max_value, 6.0);
    assert_relative_eq!(hba1c.average_value, 4.0);
}

#[rstest]
#[case(false, 4.0, 2.0)]
#[case(true, 1.2, 2.1499353995462798)]
fn test_missing_value_strategies(
    #[case] missing_means_zero: bool,
    #[case] mean: f64,
    #[case] sd: f64,
) {
    let rows = measurement(&[(1, 2.0), (4, 4.0), (7, 6.0)]);
    let result = aggregate_rows(rows, catalog(missing_means_zero), 10).unwrap();
    let hba1c = &result.continuous[0];
    assert_eq!(hba1c.count_value, 3);
    assert_relative_eq!(hba1c.average_value, mean, epsilon = 1e-12);
    assert_relative_eq!(hba1c.standard_deviation, sd, epsilon = 1e-12);
}

#[rstest]
#[case(0, 100)]
#[case(1, 100)]
#[case(37, 100)]
#[case(100, 100)]
fn test_binary_k_of_n(#[case] k: i64, #[case] n: usize) {
    let rows = (0..k).map(|row_id| CovariateRow::new(row_id, 8507001, 1.0));
    let result = aggregate_rows(rows, catalog(true), n).unwrap();
    if k == 0 {
        assert!(result.binary.is_empty());
    } else {
        assert_eq!(result.binary[0].sum_value, k as u64);
        assert_relative_eq!(result.binary[0].average_value, k as f64 / n as f64);
    }
}

#[test]
fn test_sqlite_matches_memory() {
    let mut rows = measurement(&[(1, 2.0), (4, 4.0), (7, 6.0), (8, 6.5)]);
    rows.extend((0..6).map(|row_id| CovariateRow::new(row_id, 8507001, 1.0)));
    let memory = InMemoryStore::from_rows(catalog(true), rows);
    let mut sqlite = SqliteStore::in_memory().unwrap();
    copy_into(&memory, &mut sqlite).unwrap();

    assert_eq!(
        aggregate(&sqlite, 12).unwrap(),
        aggregate(&memory, 12).unwrap()
    );
}

#[test]
fn test_duplicate_rows_abort() {
    let rows = measurement(&[(1, 2.0), (1, 3.0)]);
    let err = aggregate_rows(rows, catalog(false), 10).unwrap_err();
    assert!(err.is_schema_violation());
}

#[test]
fn test_compare_target_with_comparator() {
    let target = aggregate_rows(
        (0..60).map(|row_id| CovariateRow::new(row_id, 8507001, 1.0)),
        catalog(true),
        100,
    )
    .unwrap();
    let comparator = aggregate_rows(
        (0..40).map(|row_id| CovariateRow::new(row_id, 8507001, 1.0)),
        catalog(true),
        100,
    )
    .unwrap();
    let report = compute_standardized_difference(&target, &comparator).unwrap();
    assert_eq!(report.records.len(), 1);
    assert_relative_eq!(report.records[0].std_diff, 0.2 / 0.24_f64.sqrt(), epsilon = 1e-12);
    assert_eq!(report.records[0].covariate_name, "gender = MALE");
}

fn aggregate_shuffled(rows: Vec<CovariateRow>, population_size: usize) -> AggregatedCovariates {
    Aggregator::new()
        .aggregate(&InMemoryStore::from_rows(catalog(true), rows), population_size)
        .unwrap()
}

proptest! {
    #[test]
    fn aggregation_ignores_row_order(
        values in proptest::collection::vec(-50.0f64..50.0, 1..40),
        seed in any::<u64>(),
    ) {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| CovariateRow::new(i as i64, 3004410703, *v))
            .collect::<Vec<_>>();
        let mut shuffled = rows.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
        let population_size = rows.len() + 5;
        prop_assert_eq!(
            aggregate_shuffled(rows, population_size),
            aggregate_shuffled(shuffled, population_size)
        );
    }

    #[test]
    fn quantiles_are_ordered(values in proptest::collection::vec(-1e3f64..1e3, 1..60)) {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| CovariateRow::new(i as i64, 3004410703, *v));
        let result = aggregate_rows(rows, catalog(false), values.len()).unwrap();
        let c = &result.continuous[0];
        let ordered = [
            c.min_value,
            c.p10_value,
            c.p25_value,
            c.median_value,
            c.p75_value,
            c.p90_value,
            c.max_value,
        ];
        prop_assert!(ordered.windows(2).all(|w| w[0] <= w[1] + 1e-9));
        prop_assert!(c.standard_deviation >= 0.0);
    }
}
