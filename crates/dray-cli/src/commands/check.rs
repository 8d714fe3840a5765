//! `dray check` command implementation
//!
//! Dry run of reconciliation: shows what a `dray load` would do
//! without writing anything.

use crate::config::AppConfig;
use crate::error::Result;
use crate::source::scan_source_dir;
use colored::Colorize;
use dray_core::{batch, Database};

pub async fn run(db: &Database, config: &AppConfig) -> Result<()> {
    let scanned = scan_source_dir(&config.source_dir)?;
    let options = config.load_source_config()?.plan_options(&[]);

    for (name, err) in &scanned.skipped {
        println!("{} {} - {}", "skip".yellow(), name, err);
    }

    let plan = batch::reconcile(db, &scanned.identities(), &options).await?;

    for file in &plan.withheld {
        println!("{} {} (duplicate or version conflict)", "hold".red(), file.raw_name);
    }
    for file in &plan.to_skip {
        println!("{} {} (already loaded)", "ok  ".green(), file.raw_name);
    }
    for decision in &plan.decisions {
        println!(
            "{} {} -> {}.{} ({})",
            "load".cyan(),
            decision.file.raw_name,
            db.schema(),
            decision.target_table,
            decision.mode
        );
    }

    println!();
    println!(
        "{} to load, {} already loaded, {} withheld, {} unrecognized",
        plan.decisions.len(),
        plan.to_skip.len(),
        plan.withheld.len(),
        scanned.skipped.len()
    );

    Ok(())
}
