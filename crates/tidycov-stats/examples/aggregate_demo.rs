//! Aggregate two synthetic cohorts and compare them.

use tidycov_data::{AnalysisRef, Catalog, CovariateRef, CovariateRow};
use tidycov_stats::{aggregate_rows, compute_standardized_difference};

fn catalog() -> Catalog {
    Catalog::from_refs(
        [
            CovariateRef::new(8507001, "gender = MALE", 1, 8507),
            CovariateRef::new(201826102, "type 2 diabetes", 102, 201826),
            CovariateRef::new(3038553703, "BMI", 703, 3038553),
        ],
        [
            AnalysisRef::binary(1, "DemographicsGender", "Demographics"),
            AnalysisRef::binary(102, "ConditionOccurrence", "Condition"),
            AnalysisRef::continuous(703, "MeasurementValue", "Measurement", false),
        ],
    )
}

fn cohort(subjects: i64, diabetes_every: i64, bmi_shift: f64) -> Vec<CovariateRow> {
    let mut rows = Vec::new();
    for row_id in 0..subjects {
        if row_id % 2 == 0 {
            rows.push(CovariateRow::new(row_id, 8507001, 1.0));
        }
        if row_id % diabetes_every == 0 {
            rows.push(CovariateRow::new(row_id, 201826102, 1.0));
        }
        if row_id % 3 == 0 {
            let bmi = 22.0 + bmi_shift + (row_id % 11) as f64 * 0.7;
            rows.push(CovariateRow::new(row_id, 3038553703, bmi));
        }
    }
    rows
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = aggregate_rows(cohort(500, 3, 2.5), catalog(), 500)?;
    let comparator = aggregate_rows(cohort(800, 8, 0.0), catalog(), 800)?;

    println!("Binary covariates (target):");
    for b in &target.binary {
        println!(
            "  {:<20} {:>5} {:>8.3}",
            target.covariate_name(b.covariate_id),
            b.sum_value,
            b.average_value
        );
    }
    println!("Continuous covariates (target):");
    for c in &target.continuous {
        println!(
            "  {:<20} n={} mean={:.2} sd={:.2} median={:.2} [p25 {:.2}, p75 {:.2}]",
            target.covariate_name(c.covariate_id),
            c.count_value,
            c.average_value,
            c.standard_deviation,
            c.median_value,
            c.p25_value,
            c.p75_value
        );
    }

    let report = compute_standardized_difference(&target, &comparator)?;
    println!("\nStandardized differences:");
    for record in &report.records {
        println!("  {:<20} {:>8.3}", record.covariate_name, record.std_diff);
    }
    Ok(())
}
