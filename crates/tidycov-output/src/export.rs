//! CSV and JSON export of tidy and aggregation results.
//!
//! Every output table of the engine can be written through [`Exporter`]:
//! covariate rows, the tidy removal record, both aggregate tables and the
//! standardized difference table. Row export streams straight from a store.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tidycov_data::{CovariateError, CovariateId, CovariateStore, TimeId};
use tidycov_stats::{
    AggregatedBinary, AggregatedContinuous, AggregatedCovariates, StandardizedDifference,
    StandardizedDifferenceReport,
};
use tidycov_tidy::TidyMetadata;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the source store failed.
    #[error("Store error: {0}")]
    Store(#[from] CovariateError),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn csv_string<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

fn json_string<T: Serialize + ?Sized>(
    value: &T,
    format: ExportFormat,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(value)?),
        _ => Ok(serde_json::to_string(value)?),
    }
}

/// One removed covariate in the flat CSV form of [`TidyMetadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRecord {
    /// Removed covariate.
    pub covariate_id: CovariateId,

    /// `infrequent` or `redundant`.
    pub reason: String,
}

/// Flat CSV form of the removal record, infrequent removals first.
pub fn removal_records(metadata: &TidyMetadata) -> Vec<RemovalRecord> {
    let tagged = |ids: &[CovariateId], reason: &str| {
        ids.iter()
            .map(|id| RemovalRecord {
                covariate_id: *id,
                reason: reason.to_string(),
            })
            .collect::<Vec<_>>()
    };
    let mut records = tagged(&metadata.deleted_infrequent_covariate_ids, "infrequent");
    records.extend(tagged(&metadata.deleted_redundant_covariate_ids, "redundant"));
    records
}

impl Exporter for TidyMetadata {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(removal_records(self)),
            _ => json_string(self, format),
        }
    }
}

#[derive(Serialize)]
struct BinaryRecord<'a> {
    covariate_id: CovariateId,
    time_id: Option<TimeId>,
    covariate_name: &'a str,
    sum_value: u64,
    average_value: f64,
}

#[derive(Serialize)]
struct ContinuousRecord<'a> {
    covariate_id: CovariateId,
    time_id: Option<TimeId>,
    covariate_name: &'a str,
    count_value: u64,
    min_value: f64,
    max_value: f64,
    average_value: f64,
    standard_deviation: f64,
    median_value: f64,
    p10_value: f64,
    p25_value: f64,
    p75_value: f64,
    p90_value: f64,
}

fn binary_records(aggregated: &AggregatedCovariates) -> impl Iterator<Item = BinaryRecord<'_>> {
    aggregated.binary.iter().map(|b: &AggregatedBinary| BinaryRecord {
        covariate_id: b.covariate_id,
        time_id: b.time_id,
        covariate_name: aggregated.covariate_name(b.covariate_id),
        sum_value: b.sum_value,
        average_value: b.average_value,
    })
}

fn continuous_records(
    aggregated: &AggregatedCovariates,
) -> impl Iterator<Item = ContinuousRecord<'_>> {
    aggregated
        .continuous
        .iter()
        .map(|c: &AggregatedContinuous| ContinuousRecord {
            covariate_id: c.covariate_id,
            time_id: c.time_id,
            covariate_name: aggregated.covariate_name(c.covariate_id),
            count_value: c.count_value,
            min_value: c.min_value,
            max_value: c.max_value,
            average_value: c.average_value,
            standard_deviation: c.standard_deviation,
            median_value: c.median_value,
            p10_value: c.p10_value,
            p25_value: c.p25_value,
            p75_value: c.p75_value,
            p90_value: c.p90_value,
        })
}

/// Write the binary and continuous tables into `dir`.
///
/// CSV produces `binary.csv` and `continuous.csv`; JSON produces a single
/// `aggregated.json` holding both tables and the catalog. Returns the files
/// written.
pub fn export_aggregates(
    aggregated: &AggregatedCovariates,
    dir: &Path,
    format: ExportFormat,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;
    let written = match format {
        ExportFormat::Csv => {
            let binary = dir.join("binary.csv");
            fs::write(&binary, csv_string(binary_records(aggregated))?)?;
            let continuous = dir.join("continuous.csv");
            fs::write(&continuous, csv_string(continuous_records(aggregated))?)?;
            vec![binary, continuous]
        }
        ExportFormat::Json | ExportFormat::PrettyJson => {
            let path = dir.join("aggregated.json");
            fs::write(&path, json_string(aggregated, format)?)?;
            vec![path]
        }
    };
    tracing::info!(files = written.len(), dir = %dir.display(), "aggregates exported");
    Ok(written)
}

impl Exporter for StandardizedDifferenceReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(&self.records),
            _ => json_string(self, format),
        }
    }
}

impl Exporter for [StandardizedDifference] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(self),
            _ => json_string(self, format),
        }
    }
}

/// Stream every row of a store to CSV.
///
/// Header: `row_id,covariate_id,time_id,covariate_value`. Returns the number
/// of rows written.
pub fn write_rows_csv<S, W>(store: &S, writer: W) -> Result<usize, ExportError>
where
    S: CovariateStore,
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    let mut written = 0;
    store
        .for_each_row(|row| {
            wtr.serialize(row)?;
            written += 1;
            Ok(())
        })
        .map_err(|e| match e {
            CovariateError::Csv(e) => ExportError::Csv(e),
            other => ExportError::Store(other),
        })?;
    wtr.flush()?;
    Ok(written)
}
