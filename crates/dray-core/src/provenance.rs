//! Provenance queries
//!
//! Answers "which files are already recorded in which tables" by
//! reading the reserved provenance column. Used by reconciliation to
//! diff candidates and by reporting commands. A table that does not
//! exist yet reads as an empty tag set — "no prior loads" and "empty
//! table" are indistinguishable on purpose, since both mean "load
//! everything".

use crate::db::{validate_identifier, Database, DbError, SOURCE_FILE_COLUMN};
use sqlx::Row;
use std::collections::{HashMap, HashSet};

/// Per-table provenance summary for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableProvenance {
    pub table_name: String,
    pub total_rows: i64,
    pub file_count: usize,
    pub source_files: Vec<String>,
}

/// Read-only view over the provenance column of a schema's tables.
#[derive(Debug, Clone)]
pub struct ProvenanceQuery<'a> {
    db: &'a Database,
}

impl<'a> ProvenanceQuery<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Distinct provenance tags present in one table; empty set when
    /// the table (or its provenance column) does not exist.
    pub async fn existing_tags(&self, table: &str) -> Result<HashSet<String>, DbError> {
        let table = validate_identifier(table)?;

        if !self.has_provenance_column(table).await? {
            return Ok(HashSet::new());
        }

        let schema = validate_identifier(self.db.schema())?;
        let rows = sqlx::query(&format!(
            "select distinct {SOURCE_FILE_COLUMN} from {schema}.{table}"
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(SOURCE_FILE_COLUMN)
                    .map_err(DbError::from)
            })
            .collect()
    }

    /// Tag sets for every data table in the schema, keyed by table name.
    pub async fn all_existing_tags(&self) -> Result<HashMap<String, HashSet<String>>, DbError> {
        let mut tags = HashMap::new();
        for table in self.db.table_names().await? {
            let table_tags = self.existing_tags(&table).await?;
            tags.insert(table, table_tags);
        }
        Ok(tags)
    }

    /// Row and source-file summary per data table, for reporting.
    pub async fn current_tables(&self) -> Result<Vec<TableProvenance>, DbError> {
        let schema = validate_identifier(self.db.schema())?;
        let mut summaries = Vec::new();

        for table in self.db.table_names().await? {
            let table = validate_identifier(&table)?;
            if !self.has_provenance_column(table).await? {
                // Table managed by someone else; nothing to report.
                continue;
            }

            let rows = sqlx::query(&format!(
                r#"
                select {SOURCE_FILE_COLUMN} as source_file, count(*) as row_count
                from {schema}.{table}
                group by {SOURCE_FILE_COLUMN}
                order by {SOURCE_FILE_COLUMN}
                "#
            ))
            .fetch_all(self.db.pool())
            .await?;

            let mut total_rows = 0i64;
            let mut source_files = Vec::with_capacity(rows.len());
            for row in &rows {
                total_rows += row.try_get::<i64, _>("row_count")?;
                source_files.push(row.try_get::<String, _>("source_file")?);
            }

            summaries.push(TableProvenance {
                table_name: table.to_string(),
                total_rows,
                file_count: source_files.len(),
                source_files,
            });
        }

        Ok(summaries)
    }

    async fn has_provenance_column(&self, table: &str) -> Result<bool, DbError> {
        if !self.db.table_exists(table).await? {
            return Ok(false);
        }

        let exists: bool = sqlx::query_scalar(
            r#"
            select exists(
                select 1 from information_schema.columns
                where table_schema = $1 and table_name = $2 and column_name = $3
            )
            "#,
        )
        .bind(self.db.schema())
        .bind(table)
        .bind(SOURCE_FILE_COLUMN)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }
}
