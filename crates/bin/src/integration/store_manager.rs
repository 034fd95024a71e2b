//! Opening and creating the SQLite stores used by the commands.

use std::io;
use std::path::Path;
use tidycov_data::{ConfigurationError, CovariateError, CovariateStore, Result, SqliteStore};

/// Open an existing store for reading.
pub(crate) fn open_store(path: &Path) -> Result<SqliteStore> {
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("covariate database {} does not exist", path.display()),
        )
        .into());
    }
    SqliteStore::open(path)
}

/// Create a new, empty store. Never overwrites an existing file.
pub(crate) fn create_store(path: &Path) -> Result<SqliteStore> {
    if path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists; refusing to overwrite", path.display()),
        )
        .into());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStore::open(path)
}

/// Create a store at `path` and fill it.
///
/// When `fill` fails the partially written file is removed, so the same
/// path can be used again.
pub(crate) fn fill_new_store<T, F>(path: &Path, fill: F) -> Result<(SqliteStore, T)>
where
    F: FnOnce(&mut SqliteStore) -> Result<T>,
{
    let mut store = create_store(path)?;
    match fill(&mut store) {
        Ok(value) => Ok((store, value)),
        Err(e) => {
            drop(store);
            if let Err(cleanup) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), "could not remove output: {}", cleanup);
            }
            Err(e)
        }
    }
}

/// The explicit population size, else the one recorded in the store.
pub(crate) fn resolve_population<S: CovariateStore>(
    store: &S,
    explicit: Option<usize>,
) -> Result<usize> {
    explicit
        .or_else(|| store.population_size())
        .ok_or_else(|| CovariateError::from(ConfigurationError::MissingPopulation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidycov_data::CovariateSink;

    #[test]
    fn test_open_missing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_store(&dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_create_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.db");
        create_store(&path).unwrap();
        assert!(create_store(&path).is_err());
        assert!(open_store(&path).is_ok());
    }

    #[test]
    fn test_failed_fill_removes_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.db");
        let result = fill_new_store(&path, |_| -> Result<()> {
            Err(ConfigurationError::MissingPopulation.into())
        });
        assert!(result.is_err());
        assert!(!path.exists());

        let (store, rows) = fill_new_store(&path, |store| {
            store.set_population_size(3)?;
            Ok(0usize)
        })
        .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(store.population_size(), Some(3));
        assert!(path.exists());
    }

    #[test]
    fn test_resolve_population() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert!(resolve_population(&store, None).is_err());
        assert_eq!(resolve_population(&store, Some(7)).unwrap(), 7);
        store.set_population_size(120).unwrap();
        assert_eq!(resolve_population(&store, None).unwrap(), 120);
        assert_eq!(resolve_population(&store, Some(7)).unwrap(), 7);
    }
}
