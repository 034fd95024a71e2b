//! Integration tests for the covariate stores.

use rstest::rstest;
use std::collections::BTreeSet;
use std::io::Write;
use tidycov_data::import::{CsvSources, import_csv};
use tidycov_data::{
    AnalysisRef, Catalog, CovariateRef, CovariateRow, CovariateSink, CovariateStore,
    InMemoryStore, SqliteStore, copy_into, filter_by_row_ids,
};

fn catalog() -> Catalog {
    Catalog::from_refs(
        [
            CovariateRef::new(1003, "age group: 0-4", 3, 0),
            CovariateRef::new(2003, "age group: 5-9", 3, 0),
            CovariateRef::new(3003, "age group: 10-14", 3, 0),
            CovariateRef::new(1901, "Charlson index", 901, 0),
        ],
        [
            AnalysisRef::binary(3, "DemographicsAgeGroup", "Demographics"),
            AnalysisRef::continuous(901, "CharlsonIndex", "Condition", true),
        ],
    )
}

fn rows() -> Vec<CovariateRow> {
    vec![
        CovariateRow::new(1, 1003, 1.0),
        CovariateRow::new(2, 2003, 1.0),
        CovariateRow::new(3, 3003, 1.0),
        CovariateRow::new(4, 1003, 1.0),
        CovariateRow::new(1, 1901, 2.0),
        CovariateRow::new(4, 1901, 5.0),
    ]
}

fn collect_groups<S: CovariateStore>(store: &S) -> Vec<(i64, Vec<CovariateRow>)> {
    let mut groups = Vec::new();
    store
        .for_each_covariate(|id, rows| {
            groups.push((id, rows.to_vec()));
            Ok(())
        })
        .unwrap();
    groups
}

#[test]
fn test_sqlite_and_memory_stream_identically() {
    let memory = InMemoryStore::from_rows(catalog(), rows()).with_population_size(4);

    let mut sqlite = SqliteStore::in_memory().unwrap();
    copy_into(&memory, &mut sqlite).unwrap();

    assert_eq!(collect_groups(&memory), collect_groups(&sqlite));
    assert_eq!(sqlite.population_size(), Some(4));
    assert_eq!(sqlite.summary().unwrap(), memory.summary().unwrap());
}

#[test]
fn test_covariate_count_ignores_catalog_only_entries() {
    let mut catalog = catalog();
    catalog.insert_covariate(CovariateRef::new(4003, "age group: 15-19", 3, 0));
    let memory = InMemoryStore::from_rows(catalog, rows());
    let mut sqlite = SqliteStore::in_memory().unwrap();
    copy_into(&memory, &mut sqlite).unwrap();

    assert_eq!(memory.covariate_count().unwrap(), 4);
    assert_eq!(sqlite.covariate_count().unwrap(), 4);
    assert_eq!(sqlite.summary().unwrap().catalog_covariates, 5);
}

#[rstest]
#[case(vec![1003, 2003, 3003], vec![(1, 1), (2, 1), (3, 1), (4, 1)])]
#[case(vec![1003, 1901], vec![(1, 2), (4, 2)])]
#[case(vec![], vec![])]
fn test_row_groups_match_across_stores(
    #[case] selected: Vec<i64>,
    #[case] expected: Vec<(i64, usize)>,
) {
    let memory = InMemoryStore::from_rows(catalog(), rows());
    let mut sqlite = SqliteStore::in_memory().unwrap();
    copy_into(&memory, &mut sqlite).unwrap();

    for store_groups in [row_groups(&memory, &selected), row_groups(&sqlite, &selected)] {
        assert_eq!(store_groups, expected);
    }
}

fn row_groups<S: CovariateStore>(store: &S, selected: &[i64]) -> Vec<(i64, usize)> {
    let mut groups = Vec::new();
    store
        .for_each_row_group(selected, |row_id, rows| {
            groups.push((row_id, rows.len()));
            Ok(())
        })
        .unwrap();
    groups
}

#[test]
fn test_filter_by_row_ids_into_sqlite() {
    let memory = InMemoryStore::from_rows(catalog(), rows());
    let mut sqlite = SqliteStore::in_memory().unwrap();
    let keep: BTreeSet<i64> = [1, 2].into_iter().collect();
    filter_by_row_ids(&memory, &keep, &mut sqlite).unwrap();

    assert_eq!(sqlite.population_size(), Some(2));
    assert_eq!(sqlite.row_count().unwrap(), 3);
}

#[test]
fn test_import_csv_into_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, body: &str| {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    };
    let rows_path = write(
        "covariates.csv",
        "row_id,covariate_id,time_id,covariate_value\n1,1003,,1\n2,2003,,1\n1,1901,,3\n",
    );
    let covariate_path = write(
        "covariate_ref.csv",
        "covariate_id,covariate_name,analysis_id,concept_id\n\
         1003,age group: 0-4,3,0\n2003,age group: 5-9,3,0\n1901,Charlson index,901,0\n",
    );
    let analysis_path = write(
        "analysis_ref.csv",
        "analysis_id,analysis_name,domain_id,is_binary,missing_means_zero\n\
         3,DemographicsAgeGroup,Demographics,Y,Y\n901,CharlsonIndex,Condition,N,Y\n",
    );

    let db_path = dir.path().join("cohort.db");
    {
        let mut store = SqliteStore::open(&db_path).unwrap();
        let imported = import_csv(
            CsvSources {
                rows: &rows_path,
                covariate_ref: &covariate_path,
                analysis_ref: &analysis_path,
            },
            &mut store,
        )
        .unwrap();
        store.set_population_size(2).unwrap();
        assert_eq!(imported, 3);
    }

    let reopened = SqliteStore::open(&db_path).unwrap();
    reopened.validate().unwrap();
    assert_eq!(reopened.population_size(), Some(2));
    assert_eq!(reopened.catalog().covariate_count(), 3);
    assert_eq!(reopened.row_count().unwrap(), 3);
}
