//! `dray reset` command implementation
//!
//! Drops the working schema and everything in it, including the audit
//! log. Destructive, so it refuses to run without `--yes`.

use crate::error::{CliError, Result};
use colored::Colorize;
use dray_core::Database;

pub async fn run(db: &Database, yes: bool) -> Result<()> {
    if !yes {
        return Err(CliError::config(format!(
            "reset drops schema '{}' and all loaded data; re-run with --yes to confirm",
            db.schema()
        )));
    }

    if !db.schema_exists().await? {
        println!("Schema '{}' does not exist; nothing to reset.", db.schema());
        return Ok(());
    }

    db.drop_schema().await?;
    println!("{} dropped schema '{}'", "done".green(), db.schema());
    Ok(())
}
