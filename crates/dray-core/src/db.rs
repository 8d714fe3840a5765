//! PostgreSQL access layer
//!
//! One [`Database`] handle per run, holding a single-connection pool:
//! the engine is single-threaded and nothing here may race itself.
//!
//! Identifier hygiene: every schema, table, or column name that reaches
//! query text must first pass [`validate_identifier`]. Values never get
//! interpolated; they go through binds or COPY payloads. This is a
//! security contract, not a style preference.

use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::OnceLock;
use thiserror::Error;

/// Reserved column carrying the originating file name on every data
/// row. A real data column with this name is a fatal config error.
pub const SOURCE_FILE_COLUMN: &str = "_source_file";

/// Shared append-only audit table, one per schema.
pub const AUDIT_TABLE: &str = "load_log";

/// Postgres caps identifiers at 63 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static regex"))
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("could not connect to the database: {0}")]
    Connection(String),

    #[error("unsafe SQL identifier '{0}': letters, digits and underscores only, not starting with a digit")]
    UnsafeIdentifier(String),

    #[error("data column '{0}' collides with the reserved provenance column")]
    ProvenanceCollision(String),

    #[error(
        "refusing full reload of table '{table}': datasets '{flagged}' and '{other}' both load into it"
    )]
    ReloadCollision {
        table: String,
        flagged: String,
        other: String,
    },

    #[error("failed to encode COPY payload: {0}")]
    Encode(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Validate a schema/table/column name against the allow-list pattern
/// before it may appear in query text.
pub fn validate_identifier(name: &str) -> Result<&str, DbError> {
    if name.len() <= MAX_IDENTIFIER_LEN && identifier_re().is_match(name) {
        Ok(name)
    } else {
        Err(DbError::UnsafeIdentifier(name.to_string()))
    }
}

/// Lowercase a raw name and replace everything outside `[a-z0-9_]`
/// with underscores; a leading digit gets a `_` prefix. The result
/// still has to pass [`validate_identifier`] before use.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut name: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// One row of the shared audit log.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub details: Option<String>,
}

/// Database handle for one run. Wraps a pool capped at a single
/// connection, plus the validated target schema name.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    schema: String,
}

impl Database {
    /// Connect and run a preflight `select 1`. Connection problems are
    /// fatal to the whole run and reported before any batch work.
    pub async fn connect(db_url: &str, schema: &str) -> Result<Self, DbError> {
        validate_identifier(schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(db_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        sqlx::query("select 1")
            .execute(&pool)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn schema_exists(&self) -> Result<bool, DbError> {
        let exists: bool =
            sqlx::query_scalar("select exists(select 1 from pg_namespace where nspname = $1)")
                .bind(&self.schema)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    pub async fn create_schema_if_absent(&self) -> Result<(), DbError> {
        let schema = validate_identifier(&self.schema)?;
        sqlx::query(&format!("create schema if not exists {schema}"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        validate_identifier(table)?;
        let exists: bool = sqlx::query_scalar(
            r#"
            select exists(
                select 1 from pg_tables
                where schemaname = $1 and tablename = $2
            )
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Data table names in the schema, audit table excluded.
    pub async fn table_names(&self) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(
            r#"
            select table_name
            from information_schema.tables
            where table_schema = $1 and table_name <> $2
            order by table_name
            "#,
        )
        .bind(&self.schema)
        .bind(AUDIT_TABLE)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name").map_err(DbError::from))
            .collect()
    }

    /// Append one audit row, creating the audit table on first use.
    pub async fn append_audit_log(
        &self,
        operation: &str,
        details: Option<&str>,
    ) -> Result<(), DbError> {
        let schema = validate_identifier(&self.schema)?;

        sqlx::query(&format!(
            r#"
            create table if not exists {schema}.{AUDIT_TABLE} (
                timestamp timestamptz not null default now(),
                operation text not null,
                details text
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "insert into {schema}.{AUDIT_TABLE} (operation, details) values ($1, $2)"
        ))
        .bind(operation)
        .bind(details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent audit entries, newest first.
    pub async fn recent_audit_entries(&self, limit: i64) -> Result<Vec<AuditEntry>, DbError> {
        let schema = validate_identifier(&self.schema)?;

        if !self.table_exists(AUDIT_TABLE).await? {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            r#"
            select timestamp, operation, details
            from {schema}.{AUDIT_TABLE}
            order by timestamp desc
            limit $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AuditEntry {
                    timestamp: row.try_get("timestamp")?,
                    operation: row.try_get("operation")?,
                    details: row.try_get("details")?,
                })
            })
            .collect()
    }

    /// Drop the whole schema, tables and audit log included. Only the
    /// explicit reset path calls this.
    pub async fn drop_schema(&self) -> Result<(), DbError> {
        let schema = validate_identifier(&self.schema)?;
        sqlx::query(&format!("drop schema if exists {schema} cascade"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("sales").is_ok());
        assert!(validate_identifier("adj_summary_v2").is_ok());
        assert!(validate_identifier("_source_file").is_ok());
        assert!(validate_identifier("A1").is_ok());
    }

    #[test]
    fn test_rejects_injection_shapes() {
        assert!(validate_identifier("sales; drop table x").is_err());
        assert!(validate_identifier("sales-2024").is_err());
        assert!(validate_identifier("1sales").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("sales\"").is_err());
        assert!(validate_identifier("sa les").is_err());
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("Video ID"), "video_id");
        assert_eq!(sanitize_identifier("Revenue (USD)"), "revenue__usd_");
        assert_eq!(sanitize_identifier("2024 Total"), "_2024_total");
        assert_eq!(sanitize_identifier("plain_name"), "plain_name");
    }

    #[test]
    fn test_rejects_overlong_identifier() {
        let name = "a".repeat(64);
        assert!(validate_identifier(&name).is_err());
        let name = "a".repeat(63);
        assert!(validate_identifier(&name).is_ok());
    }
}
