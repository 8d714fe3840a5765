//! `dray status` command implementation
//!
//! Reports what the database already holds: per-table row counts and
//! source files, read from the provenance column, plus optionally the
//! tail of the audit log.

use crate::error::Result;
use colored::Colorize;
use dray_core::{Database, ProvenanceQuery};

pub async fn run(db: &Database, log: i64) -> Result<()> {
    let provenance = ProvenanceQuery::new(db);
    let tables = provenance.current_tables().await?;

    if tables.is_empty() {
        println!("No loaded tables in schema '{}'.", db.schema());
    } else {
        println!("{}", format!("Tables in schema '{}':", db.schema()).cyan().bold());
        println!();

        let mut total_rows = 0i64;
        let mut total_files = 0usize;
        for table in &tables {
            println!("{}", table.table_name.green());
            println!("  Rows:  {}", table.total_rows);
            println!("  Files: {}", table.file_count);
            for file in &table.source_files {
                println!("    {}", file);
            }
            println!();
            total_rows += table.total_rows;
            total_files += table.file_count;
        }

        println!("{}", "Summary:".cyan().bold());
        println!("  Tables: {}", tables.len());
        println!("  Files:  {}", total_files);
        println!("  Rows:   {}", total_rows);
    }

    if log > 0 {
        let entries = db.recent_audit_entries(log).await?;
        println!();
        println!("{}", "Recent audit log:".cyan().bold());
        for entry in &entries {
            let when = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
            match &entry.details {
                Some(details) => println!("  {} {} ({})", when, entry.operation, details),
                None => println!("  {} {}", when, entry.operation),
            }
        }
    }

    Ok(())
}
