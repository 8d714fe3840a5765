//! Load planning
//!
//! Turns a reconciled set of files-to-load into one [`LoadDecision`]
//! per file: which table, and whether the load appends or replaces.
//! Replace is strictly opt-in per run via the full-reload flag — it is
//! never inferred from version numbers, because silently dropping
//! historical rows without operator intent is unacceptable.

use crate::db::{sanitize_identifier, validate_identifier, DbError};
use crate::identity::FileIdentity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// How a file's rows land in the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    Append,
    /// Truncate the table first. Granted only to the first file of a
    /// full-reload-flagged dataset within a batch.
    Replace,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Append => write!(f, "append"),
            LoadMode::Replace => write!(f, "replace"),
        }
    }
}

/// One planned load: file, resolved target table, and mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDecision {
    pub file: FileIdentity,
    pub target_table: String,
    pub mode: LoadMode,
}

/// Caller-supplied planning inputs, read from configuration.
///
/// Overrides may map several datasets into one shared table, but a
/// full-reload flag on any of them is rejected at planning time: the
/// truncate would also wipe the other datasets' rows.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// base_name -> explicit table name
    pub table_overrides: HashMap<String, String>,
    /// Datasets the operator flagged for a full reload this run.
    pub full_reload: HashSet<String>,
}

/// Resolve the target table for a dataset: the override when present,
/// otherwise the sanitized base name. Always validated before use.
pub fn target_table(
    base_name: &str,
    table_overrides: &HashMap<String, String>,
) -> Result<String, DbError> {
    let table = match table_overrides.get(base_name) {
        Some(explicit) => explicit.clone(),
        None => sanitize_identifier(base_name),
    };
    validate_identifier(&table)?;
    Ok(table)
}

/// Produce one decision per file, in deterministic batch order
/// (base name, version, period, raw name).
pub fn plan(to_load: &[FileIdentity], options: &PlanOptions) -> Result<Vec<LoadDecision>, DbError> {
    let mut ordered: Vec<&FileIdentity> = to_load.iter().collect();
    ordered.sort_by(|a, b| {
        (&a.base_name, &a.version, a.period, &a.raw_name).cmp(&(
            &b.base_name,
            &b.version,
            b.period,
            &b.raw_name,
        ))
    });

    // A Replace truncate must not touch rows another dataset in this
    // batch loads into the same table.
    let mut bases_by_table: HashMap<String, BTreeSet<&str>> = HashMap::new();
    for file in &ordered {
        let table = target_table(&file.base_name, &options.table_overrides)?;
        bases_by_table
            .entry(table)
            .or_default()
            .insert(file.base_name.as_str());
    }
    for (table, bases) in &bases_by_table {
        if bases.len() < 2 {
            continue;
        }
        let flagged = bases
            .iter()
            .copied()
            .find(|b| options.full_reload.contains(*b));
        if let Some(flagged) = flagged {
            let other = bases
                .iter()
                .copied()
                .find(|b| *b != flagged)
                .unwrap_or(flagged);
            return Err(DbError::ReloadCollision {
                table: table.clone(),
                flagged: flagged.to_string(),
                other: other.to_string(),
            });
        }
    }

    let mut replaced: HashSet<&str> = HashSet::new();
    let mut decisions = Vec::with_capacity(ordered.len());

    for file in ordered {
        let table = target_table(&file.base_name, &options.table_overrides)?;

        let mode = if options.full_reload.contains(&file.base_name)
            && replaced.insert(file.base_name.as_str())
        {
            LoadMode::Replace
        } else {
            LoadMode::Append
        };

        decisions.push(LoadDecision {
            file: file.clone(),
            target_table: table,
            mode,
        });
    }

    Ok(decisions)
}
