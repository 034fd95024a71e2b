//! Glue between the command line and the library crates.
//!
//! Configuration loading, progress bars and opening/creating the SQLite
//! stores the commands read and write.

pub(crate) mod config;
pub(crate) mod progress;
pub(crate) mod store_manager;
