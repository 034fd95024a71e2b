#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tidycov/tidycov/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod quantile;
pub mod std_diff;

// Re-export main types
pub use aggregate::{
    AggregatedBinary, AggregatedContinuous, AggregatedCovariates, Aggregator, aggregate,
    aggregate_rows,
};
pub use quantile::SparseSample;
pub use std_diff::{
    NonComparable, NonComparableReason, StandardizedDifference, StandardizedDifferenceReport,
    compute_standardized_difference, standardized_difference,
};
