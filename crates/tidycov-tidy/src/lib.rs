#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tidycov/tidycov/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod frequency;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod redundancy;
pub mod settings;
pub mod warning;

pub use frequency::FrequencyFilter;
pub use normalize::{NormFactor, Normalization, Normalizer};
pub use pipeline::{TidyMetadata, TidyOutput, TidyPipeline, tidy};
pub use profile::{CovariateProfile, profile_store};
pub use redundancy::{RedundancyDecision, RedundancyDetector};
pub use settings::{DEFAULT_MIN_FRACTION, TidySettings};
pub use warning::DataQualityWarning;
