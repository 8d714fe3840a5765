//! Atomic bulk loader
//!
//! Loads one decoded file into its target table as a single
//! transactional `COPY ... FROM STDIN`. Row-by-row insertion is not an
//! option here: a mid-load failure would strand partially loaded,
//! untagged rows, which breaks the provenance invariant. Either every
//! row lands — provenance column included — or none do.
//!
//! Per file the loader moves Planned -> Staging -> Committed, or
//! Planned -> Staging -> Failed with one audit entry either way. A
//! failed file is absent from provenance and simply becomes eligible
//! again on the next run; there is no automatic retry.

use crate::db::{validate_identifier, Database, DbError, SOURCE_FILE_COLUMN};
use crate::planner::{LoadDecision, LoadMode};
use crate::table::{ColumnDef, DecodedTable};
use thiserror::Error;
use tracing::{debug, error, info};

/// Bulk-insert failure, isolated to a single file. The batch carries
/// on; the failure is already in the audit log by the time the caller
/// sees this.
#[derive(Debug, Error)]
#[error("bulk load of '{file}' into {table} failed: {source}")]
pub struct LoadError {
    pub table: String,
    pub file: String,
    #[source]
    pub source: DbError,
}

/// Successful load result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub rows_written: u64,
}

/// Executes planned loads against the run's database handle.
#[derive(Debug, Clone)]
pub struct BulkLoader<'a> {
    db: &'a Database,
}

impl<'a> BulkLoader<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Load one decoded file according to its decision.
    ///
    /// Writes a success or failure audit entry in every case and never
    /// leaves partial rows behind on failure.
    pub async fn load(
        &self,
        decision: &LoadDecision,
        data: &DecodedTable,
    ) -> Result<LoadOutcome, LoadError> {
        let table = decision.target_table.as_str();
        let file = decision.file.raw_name.as_str();

        debug!(table, file, mode = %decision.mode, rows = data.row_count(), "Staging bulk load");

        match self.stage_and_commit(decision, data).await {
            Ok(rows_written) => {
                let operation = format!(
                    "loaded {} rows into {}.{}",
                    rows_written,
                    self.db.schema(),
                    table
                );
                self.audit(&operation, Some(file)).await;
                info!(table, file, rows_written, "Bulk load committed");
                Ok(LoadOutcome { rows_written })
            },
            Err(source) => {
                let operation = format!("load failed for {}.{}", self.db.schema(), table);
                let details = format!("{file}: {source}");
                self.audit(&operation, Some(&details)).await;
                error!(table, file, error = %source, "Bulk load failed");
                Err(LoadError {
                    table: table.to_string(),
                    file: file.to_string(),
                    source,
                })
            },
        }
    }

    /// The atomic part: create the table if needed, truncate on
    /// replace, then COPY the whole payload, all in one transaction.
    async fn stage_and_commit(
        &self,
        decision: &LoadDecision,
        data: &DecodedTable,
    ) -> Result<u64, DbError> {
        let schema = validate_identifier(self.db.schema())?;
        let table = validate_identifier(&decision.target_table)?;
        for column in &data.columns {
            validate_identifier(&column.name)?;
            if column.name == SOURCE_FILE_COLUMN {
                return Err(DbError::ProvenanceCollision(column.name.clone()));
            }
        }

        let payload = encode_csv_payload(data, &decision.file.raw_name)?;

        let mut tx = self.db.pool().begin().await?;

        sqlx::query(&create_table_sql(schema, table, &data.columns))
            .execute(&mut *tx)
            .await?;

        if decision.mode == LoadMode::Replace {
            sqlx::query(&format!("truncate table {schema}.{table}"))
                .execute(&mut *tx)
                .await?;
        }

        let mut copy = (&mut *tx).copy_in_raw(&copy_sql(schema, table, &data.columns)).await?;
        if let Err(e) = copy.send(payload.as_slice()).await {
            // Abort the COPY so the transaction can roll back cleanly.
            let _ = copy.abort("payload send failed").await;
            return Err(e.into());
        }
        let rows_written = copy.finish().await?;

        tx.commit().await?;
        Ok(rows_written)
    }

    /// Audit failures must not mask the load result; they are logged
    /// and dropped.
    async fn audit(&self, operation: &str, details: Option<&str>) {
        if let Err(e) = self.db.append_audit_log(operation, details).await {
            error!(error = %e, operation, "Failed to write audit log entry");
        }
    }
}

fn create_table_sql(schema: &str, table: &str, columns: &[ColumnDef]) -> String {
    let mut defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.ty.sql_type()))
        .collect();
    defs.push(format!("{SOURCE_FILE_COLUMN} text not null"));
    format!(
        "create table if not exists {schema}.{table} ({})",
        defs.join(", ")
    )
}

fn copy_sql(schema: &str, table: &str, columns: &[ColumnDef]) -> String {
    let mut names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    names.push(SOURCE_FILE_COLUMN);
    format!(
        "copy {schema}.{table} ({}) from stdin with (format csv)",
        names.join(", ")
    )
}

/// Re-encode the decoded rows as CSV for COPY, appending the
/// provenance tag to every row. Empty cells stay unquoted and thus
/// arrive as NULL.
fn encode_csv_payload(data: &DecodedTable, provenance_tag: &str) -> Result<Vec<u8>, DbError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    for row in &data.rows {
        let mut record = csv::StringRecord::with_capacity(64, row.len() + 1);
        for cell in row {
            record.push_field(cell);
        }
        record.push_field(provenance_tag);
        writer
            .write_record(&record)
            .map_err(|e| DbError::Encode(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| DbError::Encode(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::table::DecodedTable;

    fn sample_table() -> DecodedTable {
        let headers = vec!["id".to_string(), "amount".to_string()];
        let rows = vec![
            vec!["1".to_string(), "1.50".to_string()],
            vec!["2".to_string(), String::new()],
        ];
        DecodedTable::new(&headers, rows).unwrap()
    }

    #[test]
    fn test_create_table_sql_appends_provenance_column() {
        let data = sample_table();
        let sql = create_table_sql("reports", "sales", &data.columns);
        assert_eq!(
            sql,
            "create table if not exists reports.sales \
             (id bigint, amount numeric(19,7), _source_file text not null)"
        );
    }

    #[test]
    fn test_copy_sql_lists_columns_in_order() {
        let data = sample_table();
        let sql = copy_sql("reports", "sales", &data.columns);
        assert_eq!(
            sql,
            "copy reports.sales (id, amount, _source_file) from stdin with (format csv)"
        );
    }

    #[test]
    fn test_payload_tags_every_row() {
        let data = sample_table();
        let payload = encode_csv_payload(&data, "sales_v1-0.csv").unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert_eq!(text, "1,1.50,sales_v1-0.csv\n2,,sales_v1-0.csv\n");
    }

    #[test]
    fn test_payload_quotes_cells_with_commas() {
        let headers = vec!["note".to_string()];
        let rows = vec![vec!["a,b".to_string()]];
        let data = DecodedTable::new(&headers, rows).unwrap();
        let payload = encode_csv_payload(&data, "n.csv").unwrap();
        assert_eq!(String::from_utf8(payload).unwrap(), "\"a,b\",n.csv\n");
    }
}
