//! In-memory covariate store.

use super::{CovariateSink, CovariateStore};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::types::{CovariateId, CovariateRow, RowId};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Covariate rows held in memory, grouped by covariate id.
///
/// Duplicate rows are kept as given so that validation can report them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryStore {
    catalog: Catalog,
    groups: BTreeMap<CovariateId, Vec<CovariateRow>>,
    population_size: Option<usize>,
}

impl InMemoryStore {
    /// Create an empty store around a catalog.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            groups: BTreeMap::new(),
            population_size: None,
        }
    }

    /// Build a store from rows in any order.
    pub fn from_rows(catalog: Catalog, rows: impl IntoIterator<Item = CovariateRow>) -> Self {
        let mut store = Self::new(catalog);
        for row in rows {
            store.groups.entry(row.covariate_id).or_default().push(row);
        }
        for group in store.groups.values_mut() {
            group.sort_by_key(CovariateRow::group_key);
        }
        store
    }

    /// Same store with a recorded population size.
    pub const fn with_population_size(mut self, population_size: usize) -> Self {
        self.population_size = Some(population_size);
        self
    }

    /// All rows in store order.
    pub fn rows(&self) -> impl Iterator<Item = &CovariateRow> {
        self.groups.values().flatten()
    }

    /// Rows of one covariate in store order.
    pub fn covariate_rows(&self, covariate_id: CovariateId) -> &[CovariateRow] {
        self.groups
            .get(&covariate_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Covariate ids with at least one row.
    pub fn covariate_ids(&self) -> Vec<CovariateId> {
        self.groups.keys().copied().collect()
    }

    /// The rows as a polars DataFrame.
    ///
    /// Columns: `row_id`, `covariate_id`, `time_id` (nullable) and
    /// `covariate_value`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut row_ids = Vec::new();
        let mut covariate_ids = Vec::new();
        let mut time_ids = Vec::new();
        let mut values = Vec::new();

        for row in self.rows() {
            row_ids.push(row.row_id);
            covariate_ids.push(row.covariate_id);
            time_ids.push(row.time_id);
            values.push(row.covariate_value);
        }

        let df = DataFrame::new(vec![
            Series::new("row_id".into(), row_ids).into(),
            Series::new("covariate_id".into(), covariate_ids).into(),
            Series::new("time_id".into(), time_ids).into(),
            Series::new("covariate_value".into(), values).into(),
        ])?;

        Ok(df)
    }
}

impl CovariateStore for InMemoryStore {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn population_size(&self) -> Option<usize> {
        self.population_size
    }

    fn is_temporal(&self) -> Result<bool> {
        Ok(self.rows().any(|r| r.time_id.is_some()))
    }

    fn row_count(&self) -> Result<usize> {
        Ok(self.groups.values().map(Vec::len).sum())
    }

    fn covariate_count(&self) -> Result<usize> {
        Ok(self.groups.len())
    }

    fn for_each_covariate<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(CovariateId, &[CovariateRow]) -> Result<()>,
    {
        for (covariate_id, rows) in &self.groups {
            visit(*covariate_id, rows)?;
        }
        Ok(())
    }

    fn for_each_row_group<F>(&self, covariate_ids: &[CovariateId], mut visit: F) -> Result<()>
    where
        F: FnMut(RowId, &[CovariateRow]) -> Result<()>,
    {
        let mut by_row: BTreeMap<RowId, Vec<CovariateRow>> = BTreeMap::new();
        for covariate_id in covariate_ids {
            for row in self.covariate_rows(*covariate_id) {
                by_row.entry(row.row_id).or_default().push(*row);
            }
        }
        for (row_id, rows) in &mut by_row {
            rows.sort_by_key(|r| (r.covariate_id, r.time_id));
            visit(*row_id, rows)?;
        }
        Ok(())
    }
}

impl CovariateSink for InMemoryStore {
    fn put_catalog(&mut self, catalog: &Catalog) -> Result<()> {
        self.catalog = catalog.clone();
        Ok(())
    }

    fn put_rows(&mut self, rows: &[CovariateRow]) -> Result<()> {
        let mut touched = Vec::new();
        for row in rows {
            self.groups.entry(row.covariate_id).or_default().push(*row);
            touched.push(row.covariate_id);
        }
        touched.sort_unstable();
        touched.dedup();
        for covariate_id in touched {
            if let Some(group) = self.groups.get_mut(&covariate_id) {
                group.sort_by_key(CovariateRow::group_key);
            }
        }
        Ok(())
    }

    fn set_population_size(&mut self, population_size: usize) -> Result<()> {
        self.population_size = Some(population_size);
        Ok(())
    }
}
