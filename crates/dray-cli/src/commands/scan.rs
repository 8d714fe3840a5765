//! `dray scan` command implementation
//!
//! Parses and groups local source files without touching the database.

use crate::error::Result;
use crate::source::scan_source_dir;
use colored::Colorize;
use dray_core::{find_duplicates, find_version_conflicts, group_by_base_name};
use std::path::Path;

pub fn run(source_dir: &Path) -> Result<()> {
    let scanned = scan_source_dir(source_dir)?;

    if !scanned.skipped.is_empty() {
        println!("{}", "Skipped (unrecognized names):".yellow().bold());
        for (name, err) in &scanned.skipped {
            println!("  {} - {}", name.yellow(), err);
        }
        println!();
    }

    let identities = scanned.identities();
    if identities.is_empty() {
        println!("No recognized source files in {}", source_dir.display());
        return Ok(());
    }

    let groups = group_by_base_name(&identities);
    println!("{}", "Datasets:".cyan().bold());
    for (base_name, files) in groups.iter() {
        println!("  {} ({} files)", base_name.green(), files.len());
        for file in files {
            println!("    {}", file.raw_name);
        }
    }
    println!();

    let duplicates = find_duplicates(&identities);
    if !duplicates.is_empty() {
        println!("{}", "Duplicate files:".red().bold());
        for file in &duplicates {
            println!("  {}", file.raw_name.red());
        }
        println!();
    }

    let conflicts = find_version_conflicts(&identities);
    if !conflicts.is_empty() {
        println!("{}", "Version conflicts:".red().bold());
        for file in &conflicts {
            println!("  {}", file.raw_name.red());
        }
        println!();
    }

    println!(
        "{} datasets, {} files, {} duplicates, {} version conflicts",
        groups.len(),
        identities.len(),
        duplicates.len(),
        conflicts.len()
    );

    Ok(())
}
