//! CSV import of covariate rows and reference tables.
//!
//! Expected headers:
//! - rows: `row_id,covariate_id,time_id,covariate_value` (`time_id` may be
//!   empty or the column omitted)
//! - covariate catalog: `covariate_id,covariate_name,analysis_id,concept_id`
//! - analysis catalog:
//!   `analysis_id,analysis_name,domain_id,is_binary,missing_means_zero`,
//!   flags written as `Y`/`N`, `true`/`false` or `1`/`0`

use crate::catalog::Catalog;
use crate::error::{CovariateError, Result};
use crate::store::CovariateSink;
use crate::types::{AnalysisId, AnalysisRef, CovariateRef, CovariateRow};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Rows written per sink call.
const IMPORT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Deserialize)]
struct AnalysisRecord {
    analysis_id: AnalysisId,
    analysis_name: String,
    #[serde(default)]
    domain_id: String,
    is_binary: String,
    missing_means_zero: String,
}

fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Ok(true),
        "n" | "no" | "false" | "0" => Ok(false),
        other => Err(CovariateError::Parse(format!(
            "Invalid {} flag: {:?}",
            field, other
        ))),
    }
}

impl TryFrom<AnalysisRecord> for AnalysisRef {
    type Error = CovariateError;

    fn try_from(record: AnalysisRecord) -> Result<Self> {
        Ok(Self {
            analysis_id: record.analysis_id,
            analysis_name: record.analysis_name,
            domain_id: record.domain_id,
            is_binary: parse_flag("is_binary", &record.is_binary)?,
            missing_means_zero: parse_flag("missing_means_zero", &record.missing_means_zero)?,
        })
    }
}

/// Read a covariate catalog table.
pub fn read_covariate_refs<R: Read>(reader: R) -> Result<Vec<CovariateRef>> {
    let mut reader = csv::Reader::from_reader(reader);
    let refs = reader
        .deserialize()
        .collect::<std::result::Result<Vec<CovariateRef>, _>>()?;
    Ok(refs)
}

/// Read an analysis catalog table.
pub fn read_analysis_refs<R: Read>(reader: R) -> Result<Vec<AnalysisRef>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut refs = Vec::new();
    for record in reader.deserialize::<AnalysisRecord>() {
        refs.push(AnalysisRef::try_from(record?)?);
    }
    Ok(refs)
}

/// Stream covariate rows into a sink in batches.
///
/// Returns the number of rows imported.
pub fn import_rows<R: Read, K: CovariateSink>(reader: R, sink: &mut K) -> Result<usize> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut batch = Vec::with_capacity(IMPORT_BATCH_SIZE);
    let mut imported = 0;

    for row in reader.deserialize::<CovariateRow>() {
        batch.push(row?);
        if batch.len() == IMPORT_BATCH_SIZE {
            sink.put_rows(&batch)?;
            imported += batch.len();
            batch.clear();
        }
    }
    if !batch.is_empty() {
        sink.put_rows(&batch)?;
        imported += batch.len();
    }

    tracing::debug!(rows = imported, "imported covariate rows");
    Ok(imported)
}

/// Paths of the three CSV tables that make up a covariate export.
#[derive(Debug, Clone, Copy)]
pub struct CsvSources<'a> {
    /// Covariate rows
    pub rows: &'a Path,
    /// Covariate catalog
    pub covariate_ref: &'a Path,
    /// Analysis catalog
    pub analysis_ref: &'a Path,
}

/// Import the three CSV tables into a sink.
///
/// The catalog is validated before any row is read. Returns the number of
/// rows imported.
pub fn import_csv<K: CovariateSink>(sources: CsvSources<'_>, sink: &mut K) -> Result<usize> {
    let covariates = read_covariate_refs(File::open(sources.covariate_ref)?)?;
    let analyses = read_analysis_refs(File::open(sources.analysis_ref)?)?;
    let catalog = Catalog::from_refs(covariates, analyses);
    catalog.validate()?;
    sink.put_catalog(&catalog)?;

    let imported = import_rows(File::open(sources.rows)?, sink)?;
    tracing::info!(
        rows = imported,
        covariates = catalog.covariate_count(),
        "covariate import complete"
    );
    Ok(imported)
}
