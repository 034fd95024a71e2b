//! SQLite-backed covariate store.
//!
//! Rows live on disk; scans walk ordered cursors so at most one covariate
//! group (or one row group) is held in memory at a time. The catalogs are
//! small and are loaded when the store is opened.

use super::{CovariateSink, CovariateStore, StoreSummary};
use crate::catalog::Catalog;
use crate::error::{Result, SchemaViolation};
use crate::types::{AnalysisRef, CovariateId, CovariateRef, CovariateRow, RowId};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

const POPULATION_SIZE_KEY: &str = "population_size";

/// Covariate store in a SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    catalog: Catalog,
    population_size: Option<usize>,
}

impl SqliteStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let mut store = Self {
            conn,
            catalog: Catalog::new(),
            population_size: None,
        };
        store.initialize_schema()?;
        store.catalog = store.load_catalog()?;
        store.population_size = store.load_population_size()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        // No uniqueness constraint: duplicates must survive to be reported.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS covariates (
                row_id INTEGER NOT NULL,
                covariate_id INTEGER NOT NULL,
                time_id INTEGER,
                covariate_value REAL NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_covariates_covariate
             ON covariates(covariate_id, time_id, row_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_covariates_row ON covariates(row_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS covariate_ref (
                covariate_id INTEGER PRIMARY KEY,
                covariate_name TEXT NOT NULL,
                analysis_id INTEGER NOT NULL,
                concept_id INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS analysis_ref (
                analysis_id INTEGER PRIMARY KEY,
                analysis_name TEXT NOT NULL,
                domain_id TEXT NOT NULL,
                is_binary INTEGER NOT NULL,
                missing_means_zero INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn load_catalog(&self) -> Result<Catalog> {
        let mut stmt = self.conn.prepare(
            "SELECT analysis_id, analysis_name, domain_id, is_binary, missing_means_zero
             FROM analysis_ref ORDER BY analysis_id",
        )?;
        let analyses = stmt
            .query_map([], |row| {
                Ok(AnalysisRef {
                    analysis_id: row.get(0)?,
                    analysis_name: row.get(1)?,
                    domain_id: row.get(2)?,
                    is_binary: row.get::<_, i64>(3)? != 0,
                    missing_means_zero: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT covariate_id, covariate_name, analysis_id, concept_id
             FROM covariate_ref ORDER BY covariate_id",
        )?;
        let covariates = stmt
            .query_map([], |row| {
                Ok(CovariateRef {
                    covariate_id: row.get(0)?,
                    covariate_name: row.get(1)?,
                    analysis_id: row.get(2)?,
                    concept_id: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Catalog::from_refs(covariates, analyses))
    }

    fn load_population_size(&self) -> Result<Option<usize>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![POPULATION_SIZE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.and_then(|v| v.parse().ok()))
    }

    /// Run all schema checks against the stored data.
    ///
    /// Reports the first duplicate `(row_id, covariate_id, time_id)`, the
    /// first covariate id used by rows but absent from the catalog, or the
    /// first covariate whose analysis is not catalogued.
    pub fn validate(&self) -> Result<()> {
        let duplicate = self
            .conn
            .query_row(
                "SELECT row_id, covariate_id, time_id FROM covariates
                 GROUP BY row_id, covariate_id, time_id
                 HAVING COUNT(*) > 1
                 ORDER BY covariate_id, row_id
                 LIMIT 1",
                [],
                |row| {
                    Ok(SchemaViolation::DuplicateRow {
                        row_id: row.get(0)?,
                        covariate_id: row.get(1)?,
                        time_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        if let Some(violation) = duplicate {
            return Err(violation.into());
        }

        let unknown = self
            .conn
            .query_row(
                "SELECT c.covariate_id, MIN(c.row_id) FROM covariates c
                 LEFT JOIN covariate_ref r ON r.covariate_id = c.covariate_id
                 WHERE r.covariate_id IS NULL
                 GROUP BY c.covariate_id
                 ORDER BY c.covariate_id
                 LIMIT 1",
                [],
                |row| {
                    Ok(SchemaViolation::UnknownCovariate {
                        covariate_id: row.get(0)?,
                        row_id: row.get(1)?,
                    })
                },
            )
            .optional()?;
        if let Some(violation) = unknown {
            return Err(violation.into());
        }

        self.catalog.validate()?;
        Ok(())
    }

    /// Replace the rows of the scratch table used by row-group scans.
    fn select_covariates(&self, covariate_ids: &[CovariateId]) -> Result<()> {
        self.conn.execute(
            "CREATE TEMP TABLE IF NOT EXISTS selected_covariates (
                covariate_id INTEGER PRIMARY KEY
            )",
            [],
        )?;
        self.conn.execute("DELETE FROM selected_covariates", [])?;

        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO selected_covariates (covariate_id) VALUES (?1)")?;
        for covariate_id in covariate_ids {
            stmt.execute(params![covariate_id])?;
        }
        Ok(())
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CovariateRow> {
    Ok(CovariateRow {
        row_id: row.get(0)?,
        covariate_id: row.get(1)?,
        time_id: row.get(2)?,
        covariate_value: row.get(3)?,
    })
}

impl CovariateStore for SqliteStore {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn population_size(&self) -> Option<usize> {
        self.population_size
    }

    fn is_temporal(&self) -> Result<bool> {
        let temporal: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM covariates WHERE time_id IS NOT NULL)",
            [],
            |row| row.get(0),
        )?;
        Ok(temporal)
    }

    fn row_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM covariates", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn covariate_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT covariate_id) FROM covariates",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn summary(&self) -> Result<StoreSummary> {
        let (rows, covariates, distinct_row_ids): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT covariate_id), COUNT(DISTINCT row_id)
             FROM covariates",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(StoreSummary {
            rows: usize::try_from(rows).unwrap_or_default(),
            covariates: usize::try_from(covariates).unwrap_or_default(),
            distinct_row_ids: usize::try_from(distinct_row_ids).unwrap_or_default(),
            catalog_covariates: self.catalog.covariate_count(),
            temporal: self.is_temporal()?,
            population_size: self.population_size,
        })
    }

    fn for_each_covariate<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(CovariateId, &[CovariateRow]) -> Result<()>,
    {
        // NULL time ids sort first, matching `Option` ordering.
        let mut stmt = self.conn.prepare(
            "SELECT row_id, covariate_id, time_id, covariate_value
             FROM covariates
             ORDER BY covariate_id, time_id, row_id",
        )?;
        let mut rows = stmt.query([])?;

        let mut current = None;
        let mut group = Vec::new();
        while let Some(row) = rows.next()? {
            let row = read_row(row)?;
            if current != Some(row.covariate_id) {
                if let Some(covariate_id) = current {
                    visit(covariate_id, &group)?;
                    group.clear();
                }
                current = Some(row.covariate_id);
            }
            group.push(row);
        }
        if let Some(covariate_id) = current {
            visit(covariate_id, &group)?;
        }

        Ok(())
    }

    fn for_each_row_group<F>(&self, covariate_ids: &[CovariateId], mut visit: F) -> Result<()>
    where
        F: FnMut(RowId, &[CovariateRow]) -> Result<()>,
    {
        self.select_covariates(covariate_ids)?;

        let mut stmt = self.conn.prepare(
            "SELECT c.row_id, c.covariate_id, c.time_id, c.covariate_value
             FROM covariates c
             JOIN selected_covariates s ON s.covariate_id = c.covariate_id
             ORDER BY c.row_id, c.covariate_id, c.time_id",
        )?;
        let mut rows = stmt.query([])?;

        let mut current = None;
        let mut group = Vec::new();
        while let Some(row) = rows.next()? {
            let row = read_row(row)?;
            if current != Some(row.row_id) {
                if let Some(row_id) = current {
                    visit(row_id, &group)?;
                    group.clear();
                }
                current = Some(row.row_id);
            }
            group.push(row);
        }
        if let Some(row_id) = current {
            visit(row_id, &group)?;
        }

        Ok(())
    }
}

impl CovariateSink for SqliteStore {
    fn put_catalog(&mut self, catalog: &Catalog) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO analysis_ref
                 (analysis_id, analysis_name, domain_id, is_binary, missing_means_zero)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for analysis in catalog.analyses() {
                stmt.execute(params![
                    analysis.analysis_id,
                    analysis.analysis_name,
                    analysis.domain_id,
                    analysis.is_binary,
                    analysis.missing_means_zero
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO covariate_ref
                 (covariate_id, covariate_name, analysis_id, concept_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for covariate in catalog.covariates() {
                stmt.execute(params![
                    covariate.covariate_id,
                    covariate.covariate_name,
                    covariate.analysis_id,
                    covariate.concept_id
                ])?;
            }
        }
        tx.commit()?;

        self.catalog = self.load_catalog()?;
        Ok(())
    }

    fn put_rows(&mut self, rows: &[CovariateRow]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO covariates (row_id, covariate_id, time_id, covariate_value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.row_id,
                    row.covariate_id,
                    row.time_id,
                    row.covariate_value
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn set_population_size(&mut self, population_size: usize) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![POPULATION_SIZE_KEY, population_size.to_string()],
        )?;
        self.population_size = Some(population_size);
        Ok(())
    }
}
