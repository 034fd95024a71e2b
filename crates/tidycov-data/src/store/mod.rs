//! Sparse covariate stores.
//!
//! A store holds the long table of covariate rows plus its [`Catalog`]. All
//! consumers read through [`CovariateStore`], which only exposes streaming
//! scans: a covariate-scoped scan (one covariate group at a time) and a
//! row-scoped scan restricted to a covariate subset. Results are written to a
//! fresh [`CovariateSink`], never back into the source.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::catalog::Catalog;
use crate::error::{Result, SchemaViolation};
use crate::types::{CovariateId, CovariateRow, MissingValueStrategy, RowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Read access to a sparse covariate table.
pub trait CovariateStore {
    /// Covariate and analysis definitions.
    fn catalog(&self) -> &Catalog;

    /// Cohort size recorded with the data, if any.
    fn population_size(&self) -> Option<usize>;

    /// Whether any row carries a time window.
    fn is_temporal(&self) -> Result<bool>;

    /// Total number of stored rows.
    fn row_count(&self) -> Result<usize>;

    /// Number of distinct covariate ids with at least one row.
    ///
    /// This is the number of groups [`CovariateStore::for_each_covariate`]
    /// visits; catalog entries without rows are not counted.
    fn covariate_count(&self) -> Result<usize>;

    /// Stream every covariate's rows as one group.
    ///
    /// Groups arrive in ascending covariate id; rows within a group are
    /// ordered by `(time_id, row_id)`. Returning an error from `visit` stops
    /// the scan and propagates the error.
    fn for_each_covariate<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(CovariateId, &[CovariateRow]) -> Result<()>;

    /// Stream the rows of `covariate_ids`, grouped by row id.
    ///
    /// Row groups arrive in ascending row id; rows within a group are ordered
    /// by `(covariate_id, time_id)`. Row ids with no row for any of the
    /// covariates are never visited.
    fn for_each_row_group<F>(&self, covariate_ids: &[CovariateId], visit: F) -> Result<()>
    where
        F: FnMut(RowId, &[CovariateRow]) -> Result<()>;

    /// Stream every row, in no particular order.
    fn for_each_row<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&CovariateRow) -> Result<()>,
    {
        self.for_each_covariate(|_, rows| rows.iter().try_for_each(&mut visit))
    }

    /// Counts describing the stored table.
    fn summary(&self) -> Result<StoreSummary> {
        let mut covariates = 0;
        let mut rows = 0;
        let mut row_ids = BTreeSet::new();
        self.for_each_covariate(|_, group| {
            covariates += 1;
            rows += group.len();
            row_ids.extend(group.iter().map(|r| r.row_id));
            Ok(())
        })?;
        Ok(StoreSummary {
            rows,
            covariates,
            distinct_row_ids: row_ids.len(),
            catalog_covariates: self.catalog().covariate_count(),
            temporal: self.is_temporal()?,
            population_size: self.population_size(),
        })
    }
}

/// Write access used to build a new store.
pub trait CovariateSink {
    /// Store both reference tables.
    fn put_catalog(&mut self, catalog: &Catalog) -> Result<()>;

    /// Append rows.
    fn put_rows(&mut self, rows: &[CovariateRow]) -> Result<()>;

    /// Record the cohort size.
    fn set_population_size(&mut self, population_size: usize) -> Result<()>;
}

/// Counts describing a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Stored rows
    pub rows: usize,
    /// Covariates with at least one row
    pub covariates: usize,
    /// Distinct row ids with at least one row
    pub distinct_row_ids: usize,
    /// Covariates in the catalog
    pub catalog_covariates: usize,
    /// Whether rows carry time windows
    pub temporal: bool,
    /// Recorded cohort size
    pub population_size: Option<usize>,
}

impl fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows:                {}", self.rows)?;
        writeln!(
            f,
            "Covariates:          {} with data, {} in catalog",
            self.covariates, self.catalog_covariates
        )?;
        writeln!(f, "Row ids with data:   {}", self.distinct_row_ids)?;
        match self.population_size {
            Some(n) => writeln!(f, "Population size:     {}", n)?,
            None => writeln!(f, "Population size:     unknown")?,
        }
        write!(f, "Temporal:            {}", if self.temporal { "yes" } else { "no" })
    }
}

/// Check one covariate group as it streams past.
///
/// Verifies that the covariate and its analysis are catalogued and that no
/// `(row_id, time_id)` repeats. Rows must be in store order.
pub fn validate_group(
    catalog: &Catalog,
    covariate_id: CovariateId,
    rows: &[CovariateRow],
) -> std::result::Result<MissingValueStrategy, SchemaViolation> {
    let first_row = rows.first().map_or(0, |r| r.row_id);
    let strategy = catalog.strategy(covariate_id, first_row)?;
    for pair in rows.windows(2) {
        if pair[0].group_key() == pair[1].group_key() {
            return Err(SchemaViolation::DuplicateRow {
                row_id: pair[1].row_id,
                covariate_id,
                time_id: pair[1].time_id,
            });
        }
    }
    Ok(strategy)
}

/// Copy a whole store into a sink.
pub fn copy_into<S, K>(store: &S, sink: &mut K) -> Result<()>
where
    S: CovariateStore,
    K: CovariateSink,
{
    sink.put_catalog(store.catalog())?;
    if let Some(n) = store.population_size() {
        sink.set_population_size(n)?;
    }
    store.for_each_covariate(|_, rows| sink.put_rows(rows))
}

/// Write the rows of the given row ids into a sink.
///
/// The recorded population size becomes the number of selected row ids.
pub fn filter_by_row_ids<S, K>(store: &S, row_ids: &BTreeSet<RowId>, sink: &mut K) -> Result<()>
where
    S: CovariateStore,
    K: CovariateSink,
{
    sink.put_catalog(store.catalog())?;
    sink.set_population_size(row_ids.len())?;
    let mut kept = Vec::new();
    store.for_each_covariate(|_, rows| {
        kept.clear();
        kept.extend(rows.iter().filter(|r| row_ids.contains(&r.row_id)).copied());
        if kept.is_empty() {
            Ok(())
        } else {
            sink.put_rows(&kept)
        }
    })
}
