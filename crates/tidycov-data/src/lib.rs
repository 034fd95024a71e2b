#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tidycov/tidycov/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod import;
pub mod progress;
pub mod store;
pub mod types;

pub use catalog::Catalog;
pub use error::{ConfigurationError, CovariateError, Result, SchemaViolation};
pub use progress::{NoProgress, Progress};
pub use store::{
    CovariateSink, CovariateStore, InMemoryStore, SqliteStore, StoreSummary, copy_into,
    filter_by_row_ids, validate_group,
};
pub use types::{
    AnalysisId, AnalysisRef, CovariateId, CovariateRef, CovariateRow, MissingValueStrategy, RowId,
    TimeId,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
