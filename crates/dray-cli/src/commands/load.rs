//! `dray load` command implementation
//!
//! Reconciles local files against the database, then bulk-loads every
//! eligible file in planner order. One file's failure never aborts the
//! rest of the batch; failures are printed, audited, and summarized at
//! the end.

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::source::{decode_file, scan_source_dir, LocalFile};
use colored::Colorize;
use dray_core::{batch, group_by_base_name, BulkLoader, Database, FileIdentity, LoadDecision};
use tracing::warn;

pub async fn run(
    db: &Database,
    config: &AppConfig,
    dataset: Option<&str>,
    full_reload: &[String],
) -> Result<()> {
    let scanned = scan_source_dir(&config.source_dir)?;
    let options = config.load_source_config()?.plan_options(full_reload);

    for (name, err) in &scanned.skipped {
        println!("{} {} - {}", "skip".yellow(), name, err);
    }

    // Restricting to one dataset goes through the group lookup so a
    // mistyped base name fails loudly instead of loading nothing.
    let identities: Vec<FileIdentity> = match dataset {
        Some(base_name) => {
            let groups = group_by_base_name(&scanned.identities());
            groups.get(base_name)?.to_vec()
        },
        None => scanned.identities(),
    };

    let plan = batch::reconcile(db, &identities, &options).await?;

    for file in &plan.withheld {
        println!(
            "{} {} (duplicate or version conflict; resolve and re-run)",
            "hold".red(),
            file.raw_name
        );
    }
    for file in &plan.to_skip {
        println!("{} {} (already loaded)", "ok  ".green(), file.raw_name);
    }

    if plan.decisions.is_empty() {
        println!();
        println!("Nothing to load.");
        return Ok(());
    }

    let loader = BulkLoader::new(db);
    let attempted = plan.decisions.len();
    let mut loaded = 0usize;
    let mut rows_total = 0u64;
    let mut failed = 0usize;

    for decision in &plan.decisions {
        let raw_name = &decision.file.raw_name;

        let local = scanned
            .files
            .iter()
            .find(|f| f.identity.raw_name == *raw_name);
        let Some(local) = local else {
            // Filtered batches still resolve paths from the full scan;
            // a missing entry here means the file vanished mid-run.
            fail(db, decision, "source file disappeared during the run").await;
            println!("{} {} - file disappeared", "FAIL".red().bold(), raw_name);
            failed += 1;
            continue;
        };

        match load_one(&loader, db, decision, local).await {
            Ok(rows_written) => {
                println!(
                    "{} {} -> {}.{} ({} rows, {})",
                    "done".green(),
                    raw_name,
                    db.schema(),
                    decision.target_table,
                    rows_written,
                    decision.mode
                );
                loaded += 1;
                rows_total += rows_written;
            },
            Err(e) => {
                println!("{} {} - {}", "FAIL".red().bold(), raw_name, e);
                failed += 1;
            },
        }
    }

    println!();
    println!(
        "Loaded {loaded} of {attempted} files ({rows_total} rows), {failed} failed, {} withheld",
        plan.withheld.len()
    );

    if failed > 0 {
        return Err(CliError::LoadsFailed { failed, attempted });
    }
    Ok(())
}

/// Decode and load one file. Decode failures are audited the same way
/// load failures are, so a later run can tell "attempted and failed"
/// from "never attempted".
async fn load_one(
    loader: &BulkLoader<'_>,
    db: &Database,
    decision: &LoadDecision,
    local: &LocalFile,
) -> Result<u64> {
    let table = match decode_file(local) {
        Ok(table) => table,
        Err(e) => {
            fail(db, decision, &e.to_string()).await;
            return Err(e);
        },
    };

    let outcome = loader.load(decision, &table).await.map_err(CliError::from)?;
    Ok(outcome.rows_written)
}

async fn fail(db: &Database, decision: &LoadDecision, message: &str) {
    let operation = format!("load failed for {}.{}", db.schema(), decision.target_table);
    let details = format!("{}: {}", decision.file.raw_name, message);
    if let Err(e) = db.append_audit_log(&operation, Some(&details)).await {
        warn!(error = %e, "Failed to write audit log entry");
    }
}
