#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tidycov/tidycov/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cohort;

// Re-export main types from sub-crates
pub use tidycov_data as data;
pub use tidycov_output as output;
pub use tidycov_stats as stats;
pub use tidycov_tidy as tidy;

pub use cohort::Cohort;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
