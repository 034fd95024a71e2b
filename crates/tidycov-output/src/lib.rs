#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tidycov/tidycov/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod summary;

pub use export::{
    ExportError, ExportFormat, Exporter, RemovalRecord, export_aggregates, removal_records,
    write_rows_csv,
};
pub use summary::{BALANCE_THRESHOLD, ComparisonSummary, TidySummary};
