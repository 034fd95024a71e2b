//! Tidy a small synthetic cohort and print what was removed.

use tidycov_data::{AnalysisRef, Catalog, CovariateRef, CovariateRow, InMemoryStore};
use tidycov_tidy::{TidyPipeline, TidySettings};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog::from_refs(
        [
            CovariateRef::new(1003, "age group: 0-4", 3, 0),
            CovariateRef::new(2003, "age group: 5-9", 3, 0),
            CovariateRef::new(3003, "age group: 10+", 3, 0),
            CovariateRef::new(4329847102, "myocardial infarction", 102, 4329847),
            CovariateRef::new(255573102, "COPD", 102, 255573),
            CovariateRef::new(1901, "Charlson index", 901, 0),
        ],
        [
            AnalysisRef::binary(3, "DemographicsAgeGroup", "Demographics"),
            AnalysisRef::binary(102, "ConditionOccurrence", "Condition"),
            AnalysisRef::continuous(901, "CharlsonIndex", "Condition", true),
        ],
    );

    let mut rows = Vec::new();
    for row_id in 0..1000 {
        let age = match row_id % 10 {
            0 | 1 => 1003,
            2..=4 => 2003,
            _ => 3003,
        };
        rows.push(CovariateRow::new(row_id, age, 1.0));
        if row_id % 9 == 0 {
            rows.push(CovariateRow::new(row_id, 255573102, 1.0));
            rows.push(CovariateRow::new(row_id, 1901, (row_id % 5) as f64 + 1.0));
        }
    }
    rows.push(CovariateRow::new(17, 4329847102, 1.0));
    let store = InMemoryStore::from_rows(catalog, rows);

    let settings = TidySettings {
        min_fraction: 0.01,
        ..Default::default()
    };
    let output = TidyPipeline::new(settings)?.run_in_memory(&store, 1000)?;
    let metadata = &output.metadata;

    println!("Infrequent: {:?}", metadata.deleted_infrequent_covariate_ids);
    println!("Redundant:  {:?}", metadata.deleted_redundant_covariate_ids);
    for factor in &metadata.norm_factors {
        println!(
            "Normalized covariate {} by {}",
            factor.covariate_id, factor.max_value
        );
    }
    println!("Remaining covariates: {:?}", output.store.covariate_ids());
    Ok(())
}
