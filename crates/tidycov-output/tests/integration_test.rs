//! Integration tests for exporting a full tidy/aggregate/compare workflow.

use rstest::rstest;
use std::fs;
use tidycov_data::{
    AnalysisRef, Catalog, CovariateRef, CovariateRow, CovariateStore, InMemoryStore,
};
use tidycov_output::{
    ComparisonSummary, ExportFormat, Exporter, TidySummary, export_aggregates, write_rows_csv,
};
use tidycov_stats::{aggregate, compute_standardized_difference};
use tidycov_tidy::{TidySettings, tidy};

fn catalog() -> Catalog {
    Catalog::from_refs(
        [
            CovariateRef::new(8507001, "gender = MALE", 1, 8507),
            CovariateRef::new(8532001, "gender = FEMALE", 1, 8532),
            CovariateRef::new(201826102, "type 2 diabetes", 102, 201826),
            CovariateRef::new(3004410703, "HbA1c", 703, 3004410),
        ],
        [
            AnalysisRef::binary(1, "DemographicsGender", "Demographics"),
            AnalysisRef::binary(102, "ConditionOccurrence", "Condition"),
            AnalysisRef::continuous(703, "MeasurementValue", "Measurement", false),
        ],
    )
}

fn cohort(subjects: i64, diabetes_every: i64) -> InMemoryStore {
    let mut rows = Vec::new();
    for row_id in 0..subjects {
        let gender = if row_id % 2 == 0 { 8507001 } else { 8532001 };
        rows.push(CovariateRow::new(row_id, gender, 1.0));
        if row_id % diabetes_every == 0 {
            rows.push(CovariateRow::new(row_id, 201826102, 1.0));
            rows.push(CovariateRow::new(row_id, 3004410703, 6.5 + (row_id % 3) as f64));
        }
    }
    InMemoryStore::from_rows(catalog(), rows).with_population_size(subjects as usize)
}

#[test]
fn test_tidy_export_workflow() {
    let source = cohort(200, 4);
    let output = tidy(&source, 200, TidySettings::default()).unwrap();

    let summary = TidySummary::new(
        &output.metadata,
        &source.summary().unwrap(),
        &output.store.summary().unwrap(),
    );
    assert_eq!(summary.redundant, 1);
    assert!(summary.to_ascii_table().contains("Removed (redundant):      1"));

    let csv = output.metadata.export_to_string(ExportFormat::Csv).unwrap();
    assert!(csv.contains("8507001,redundant"));

    let mut rows = Vec::new();
    let written = write_rows_csv(&output.store, &mut rows).unwrap();
    assert_eq!(written, output.store.row_count().unwrap());
}

#[rstest]
#[case(ExportFormat::Csv, &[("binary.csv", "8507001"), ("continuous.csv", "3004410703")])]
#[case(ExportFormat::Json, &[("aggregated.json", "8507001"), ("aggregated.json", "3004410703")])]
#[case(ExportFormat::PrettyJson, &[("aggregated.json", "8507001"), ("aggregated.json", "3004410703")])]
fn test_export_aggregates(#[case] format: ExportFormat, #[case] expected: &[(&str, &str)]) {
    let dir = tempfile::tempdir().unwrap();
    let aggregated = aggregate(&cohort(100, 5), 100).unwrap();
    let written = export_aggregates(&aggregated, dir.path(), format).unwrap();

    let mut names: Vec<&str> = expected.iter().map(|(name, _)| *name).collect();
    names.dedup();
    assert_eq!(written.len(), names.len());
    for (name, covariate_id) in expected {
        let content = fs::read_to_string(dir.path().join(name)).unwrap();
        assert!(content.contains(covariate_id), "{} lacks {}", name, covariate_id);
    }
}

#[test]
fn test_binary_csv_columns() {
    let dir = tempfile::tempdir().unwrap();
    let aggregated = aggregate(&cohort(100, 5), 100).unwrap();
    export_aggregates(&aggregated, dir.path(), ExportFormat::Csv).unwrap();

    let binary = fs::read_to_string(dir.path().join("binary.csv")).unwrap();
    let mut lines = binary.lines();
    assert_eq!(
        lines.next(),
        Some("covariate_id,time_id,covariate_name,sum_value,average_value")
    );
    assert_eq!(lines.next(), Some("8507001,,gender = MALE,50,0.5"));

    let continuous = fs::read_to_string(dir.path().join("continuous.csv")).unwrap();
    assert!(continuous.starts_with("covariate_id,time_id,covariate_name,count_value,min_value"));
}

#[test]
fn test_comparison_export() {
    let target = aggregate(&cohort(100, 2), 100).unwrap();
    let comparator = aggregate(&cohort(100, 10), 100).unwrap();
    let report = compute_standardized_difference(&target, &comparator).unwrap();

    let summary = ComparisonSummary::new(&report, 10);
    assert_eq!(summary.records[0].covariate_name, "type 2 diabetes");
    assert_eq!(summary.non_comparable, 0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("std_diff.json");
    report.export_to_file(&path, ExportFormat::Json).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(parsed["records"].as_array().map(Vec::len), Some(4));
}
