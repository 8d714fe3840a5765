//! Bulk loader integration tests against a live PostgreSQL instance.
//!
//! **Requirements**:
//! - PostgreSQL must be running and reachable
//! - DRAY_TEST_DATABASE_URL must point at a database the tests may
//!   create and drop schemas in
//! - Tests are skipped silently when DRAY_TEST_DATABASE_URL is unset
//!
//! Each test works in its own schema and drops it on success, so tests
//! can run in parallel against one database.

use dray_core::{
    BulkLoader, Database, DecodedTable, FileIdentity, LoadDecision, LoadMode, ProvenanceQuery,
    SOURCE_FILE_COLUMN,
};

/// Connect and prepare a fresh schema, or `None` when no test database
/// is configured.
async fn setup(test_name: &str) -> Option<Database> {
    let url = std::env::var("DRAY_TEST_DATABASE_URL").ok()?;

    let schema = format!("dray_test_{}_{}", test_name, std::process::id());
    let db = match Database::connect(&url, &schema).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to connect to test database: {e}");
            return None;
        },
    };

    // Clean slate in case an earlier run died mid-test
    db.drop_schema().await.expect("drop stale test schema");
    db.create_schema_if_absent().await.expect("create test schema");
    Some(db)
}

async fn teardown(db: Database) {
    db.drop_schema().await.expect("drop test schema");
    db.close().await;
}

fn decision(raw_name: &str, target_table: &str, mode: LoadMode) -> LoadDecision {
    LoadDecision {
        file: FileIdentity::parse(raw_name).expect("valid file name"),
        target_table: target_table.to_string(),
        mode,
    }
}

fn table(headers: &[&str], rows: &[&[&str]]) -> DecodedTable {
    let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
    DecodedTable::new(&headers, rows).expect("valid table")
}

async fn count_rows(db: &Database, target: &str, tag: Option<&str>) -> i64 {
    let sql = match tag {
        Some(_) => format!(
            "select count(*) from {}.{} where {} = $1",
            db.schema(),
            target,
            SOURCE_FILE_COLUMN
        ),
        None => format!("select count(*) from {}.{}", db.schema(), target),
    };
    let mut query = sqlx::query_scalar(&sql);
    if let Some(tag) = tag {
        query = query.bind(tag);
    }
    query.fetch_one(db.pool()).await.expect("count query")
}

#[tokio::test]
async fn append_load_writes_rows_provenance_and_audit() {
    let Some(db) = setup("append").await else { return };

    let data = table(
        &["Region", "Amount"],
        &[&["north", "10.50"], &["south", "3.25"]],
    );
    let decision = decision("sales_v1-0_202401.csv.gz", "sales", LoadMode::Append);

    let outcome = BulkLoader::new(&db).load(&decision, &data).await.expect("load");
    assert_eq!(outcome.rows_written, 2);

    assert_eq!(count_rows(&db, "sales", None).await, 2);
    assert_eq!(
        count_rows(&db, "sales", Some("sales_v1-0_202401.csv.gz")).await,
        2
    );

    let tags = ProvenanceQuery::new(&db)
        .existing_tags("sales")
        .await
        .expect("existing tags");
    assert!(tags.contains("sales_v1-0_202401.csv.gz"));

    let entries = db.recent_audit_entries(10).await.expect("audit entries");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].operation.contains("loaded 2 rows"));
    assert_eq!(
        entries[0].details.as_deref(),
        Some("sales_v1-0_202401.csv.gz")
    );

    teardown(db).await;
}

#[tokio::test]
async fn empty_cells_store_as_null_not_empty_string() {
    let Some(db) = setup("nulls").await else { return };

    let data = table(&["id", "note"], &[&["1", ""], &["2", "ok"]]);
    let decision = decision("notes_202401.csv", "notes", LoadMode::Append);
    BulkLoader::new(&db).load(&decision, &data).await.expect("load");

    let nulls: i64 = sqlx::query_scalar(&format!(
        "select count(*) from {}.notes where note is null",
        db.schema()
    ))
    .fetch_one(db.pool())
    .await
    .expect("null count");
    assert_eq!(nulls, 1);

    teardown(db).await;
}

#[tokio::test]
async fn replace_truncates_before_loading() {
    let Some(db) = setup("replace").await else { return };
    let loader = BulkLoader::new(&db);

    let first = table(&["id"], &[&["1"], &["2"]]);
    loader
        .load(
            &decision("sales_v1-0_202401.csv.gz", "sales", LoadMode::Append),
            &first,
        )
        .await
        .expect("first load");

    let second = table(&["id"], &[&["3"]]);
    loader
        .load(
            &decision("sales_v1-0_202402.csv.gz", "sales", LoadMode::Replace),
            &second,
        )
        .await
        .expect("replace load");

    assert_eq!(count_rows(&db, "sales", None).await, 1);
    assert_eq!(
        count_rows(&db, "sales", Some("sales_v1-0_202401.csv.gz")).await,
        0
    );

    teardown(db).await;
}

#[tokio::test]
async fn failed_load_leaves_no_rows_behind() {
    let Some(db) = setup("atomicity").await else { return };
    let loader = BulkLoader::new(&db);

    // First load types the amount column as bigint
    let first = table(&["id", "amount"], &[&["1", "10"]]);
    loader
        .load(
            &decision("sales_v1-0_202401.csv.gz", "sales", LoadMode::Append),
            &first,
        )
        .await
        .expect("first load");

    // Second file carries text in that column, so COPY must fail
    let second = table(&["id", "amount"], &[&["2", "20"], &["3", "not-a-number"]]);
    let err = loader
        .load(
            &decision("sales_v1-0_202402.csv.gz", "sales", LoadMode::Append),
            &second,
        )
        .await
        .expect_err("typed column mismatch");
    assert!(err.to_string().contains("sales_v1-0_202402.csv.gz"));

    // Prior rows intact, nothing from the failed file, failure audited
    assert_eq!(count_rows(&db, "sales", None).await, 1);
    assert_eq!(
        count_rows(&db, "sales", Some("sales_v1-0_202402.csv.gz")).await,
        0
    );

    let entries = db.recent_audit_entries(10).await.expect("audit entries");
    let failures: Vec<_> = entries
        .iter()
        .filter(|e| e.operation.contains("load failed"))
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0]
        .details
        .as_deref()
        .unwrap_or_default()
        .starts_with("sales_v1-0_202402.csv.gz:"));

    teardown(db).await;
}

#[tokio::test]
async fn provenance_of_absent_table_reads_empty() {
    let Some(db) = setup("absent").await else { return };

    let tags = ProvenanceQuery::new(&db)
        .existing_tags("never_loaded")
        .await
        .expect("existing tags");
    assert!(tags.is_empty());

    let all = ProvenanceQuery::new(&db)
        .all_existing_tags()
        .await
        .expect("all tags");
    assert!(all.is_empty());

    teardown(db).await;
}

#[tokio::test]
async fn status_summary_counts_rows_per_source_file() {
    let Some(db) = setup("status").await else { return };
    let loader = BulkLoader::new(&db);

    loader
        .load(
            &decision("sales_v1-0_202401.csv.gz", "sales", LoadMode::Append),
            &table(&["id"], &[&["1"], &["2"]]),
        )
        .await
        .expect("first load");
    loader
        .load(
            &decision("sales_v1-0_202402.csv.gz", "sales", LoadMode::Append),
            &table(&["id"], &[&["3"]]),
        )
        .await
        .expect("second load");

    let tables = ProvenanceQuery::new(&db)
        .current_tables()
        .await
        .expect("current tables");
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].table_name, "sales");
    assert_eq!(tables[0].total_rows, 3);
    assert_eq!(tables[0].file_count, 2);

    teardown(db).await;
}
