//! Demonstration of the export functionality in tidycov-output.

use tidycov_data::{AnalysisRef, Catalog, CovariateRef, CovariateRow, InMemoryStore};
use tidycov_output::{ComparisonSummary, ExportFormat, Exporter, export_aggregates};
use tidycov_stats::{aggregate, compute_standardized_difference};
use tidycov_tidy::{TidySettings, tidy};

fn catalog() -> Catalog {
    Catalog::from_refs(
        [
            CovariateRef::new(1003, "age group: 0-39", 3, 0),
            CovariateRef::new(2003, "age group: 40+", 3, 0),
            CovariateRef::new(316866102, "hypertension", 102, 316866),
            CovariateRef::new(3004410703, "HbA1c", 703, 3004410),
        ],
        [
            AnalysisRef::binary(3, "DemographicsAgeGroup", "Demographics"),
            AnalysisRef::binary(102, "ConditionOccurrence", "Condition"),
            AnalysisRef::continuous(703, "MeasurementValue", "Measurement", false),
        ],
    )
}

fn cohort(subjects: i64, hypertension_every: i64) -> InMemoryStore {
    let mut rows = Vec::new();
    for row_id in 0..subjects {
        let age = if row_id % 3 == 0 { 1003 } else { 2003 };
        rows.push(CovariateRow::new(row_id, age, 1.0));
        if row_id % hypertension_every == 0 {
            rows.push(CovariateRow::new(row_id, 316866102, 1.0));
        }
        if row_id % 4 == 0 {
            rows.push(CovariateRow::new(row_id, 3004410703, 5.0 + (row_id % 7) as f64 * 0.3));
        }
    }
    InMemoryStore::from_rows(catalog(), rows)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== tidycov Export Demo ===\n");

    let target = cohort(600, 2);
    let comparator = cohort(900, 5);

    println!("1. Tidy removal record\n");
    let tidied = tidy(&target, 600, TidySettings::default())?;
    println!("{}", tidied.metadata.export_to_string(ExportFormat::Csv)?);
    println!("{}", tidied.metadata.export_to_string(ExportFormat::PrettyJson)?);

    println!("2. Aggregated tables\n");
    let aggregated_target = aggregate(&target, 600)?;
    let aggregated_comparator = aggregate(&comparator, 900)?;
    let dir = std::env::temp_dir().join("tidycov-export-demo");
    for path in export_aggregates(&aggregated_target, &dir, ExportFormat::Csv)? {
        println!("   wrote {}", path.display());
    }

    println!("\n3. Standardized differences\n");
    let report = compute_standardized_difference(&aggregated_target, &aggregated_comparator)?;
    println!("{}", report.export_to_string(ExportFormat::Csv)?);
    println!("{}", ComparisonSummary::new(&report, 10).to_ascii_table());

    Ok(())
}
