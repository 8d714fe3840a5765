//! Batch reconciliation
//!
//! Ties the pure pieces together for one run: detect duplicates and
//! version conflicts, withhold the affected files pending operator
//! resolution, diff the remainder against recorded provenance, and
//! plan the loads. Findings are advisory — the caller decides whether
//! to abort, prompt, or proceed with the clean subset.

use crate::db::{Database, DbError};
use crate::grouping::{diff_against_provenance, find_duplicates, find_version_conflicts};
use crate::identity::FileIdentity;
use crate::planner::{plan, LoadDecision, PlanOptions};
use crate::provenance::ProvenanceQuery;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Advisory findings from duplicate and version-conflict detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileFindings {
    pub duplicates: Vec<FileIdentity>,
    pub version_conflicts: Vec<FileIdentity>,
}

impl ReconcileFindings {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.version_conflicts.is_empty()
    }
}

/// The reconciled shape of one batch: what loads, what is skipped as
/// already present, and what is withheld for the operator.
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    pub findings: ReconcileFindings,
    /// Already recorded in provenance; nothing to do.
    pub to_skip: Vec<FileIdentity>,
    /// Flagged files excluded from planning until resolved.
    pub withheld: Vec<FileIdentity>,
    pub decisions: Vec<LoadDecision>,
}

/// Reconcile candidate files against the database, then plan loads.
pub async fn reconcile(
    db: &Database,
    files: &[FileIdentity],
    options: &PlanOptions,
) -> Result<BatchPlan, DbError> {
    let existing = ProvenanceQuery::new(db).all_existing_tags().await?;
    reconcile_with_tags(files, &existing, options)
}

/// Pure reconciliation against an already-fetched tag map.
pub fn reconcile_with_tags(
    files: &[FileIdentity],
    existing_tags: &HashMap<String, HashSet<String>>,
    options: &PlanOptions,
) -> Result<BatchPlan, DbError> {
    let findings = ReconcileFindings {
        duplicates: find_duplicates(files),
        version_conflicts: find_version_conflicts(files),
    };

    let flagged: HashSet<&str> = findings
        .duplicates
        .iter()
        .chain(findings.version_conflicts.iter())
        .map(|f| f.raw_name.as_str())
        .collect();

    if !flagged.is_empty() {
        warn!(
            withheld = flagged.len(),
            duplicates = findings.duplicates.len(),
            version_conflicts = findings.version_conflicts.len(),
            "Withholding flagged files pending resolution"
        );
    }

    let mut withheld = Vec::new();
    let mut reload_all = Vec::new();
    let mut candidates = Vec::new();
    for file in files {
        if flagged.contains(file.raw_name.as_str()) {
            withheld.push(file.clone());
        } else if options.full_reload.contains(&file.base_name) {
            // A full reload rebuilds its table from everything on
            // disk. These files must not go through the provenance
            // skip: the Replace truncate would wipe rows whose source
            // files this run then never re-loads.
            reload_all.push(file.clone());
        } else {
            candidates.push(file.clone());
        }
    }

    let mut diff = diff_against_provenance(&candidates, existing_tags, &options.table_overrides)?;
    diff.to_load.extend(reload_all);
    let decisions = plan(&diff.to_load, options)?;

    debug!(
        candidates = candidates.len(),
        to_load = decisions.len(),
        to_skip = diff.to_skip.len(),
        withheld = withheld.len(),
        "Batch reconciled"
    );

    Ok(BatchPlan {
        findings,
        to_skip: diff.to_skip,
        withheld,
        decisions,
    })
}
