//! File grouping and reconciliation
//!
//! Pure set logic over parsed [`FileIdentity`] values: partition files
//! per dataset, surface duplicates and ambiguous versions for operator
//! review, and diff candidate files against provenance tags already
//! recorded in the database. Detection here is advisory; nothing in
//! this module aborts a run on its own.

use crate::db::DbError;
use crate::identity::FileIdentity;
use crate::planner::target_table;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Lookup of a dataset that has no group. Deliberately an error rather
/// than an empty group so that typos in dataset names surface loudly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no file group for dataset '{0}'")]
pub struct KeyNotFound(pub String);

/// Files partitioned by dataset base name.
///
/// Within each group, files are ordered by version, then period, then
/// raw name, so resolution logic can rely on "last is newest".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileGroups(BTreeMap<String, Vec<FileIdentity>>);

impl FileGroups {
    /// Look up the group for a dataset. Absent base names fail with
    /// [`KeyNotFound`]; there is no default-empty fallback.
    pub fn get(&self, base_name: &str) -> Result<&[FileIdentity], KeyNotFound> {
        self.0
            .get(base_name)
            .map(Vec::as_slice)
            .ok_or_else(|| KeyNotFound(base_name.to_string()))
    }

    pub fn base_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FileIdentity])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of files across all groups.
    pub fn file_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

/// Partition files by base name. Every input file lands in exactly one
/// group; insertion order is irrelevant.
pub fn group_by_base_name(files: &[FileIdentity]) -> FileGroups {
    let mut groups: BTreeMap<String, Vec<FileIdentity>> = BTreeMap::new();
    for file in files {
        groups
            .entry(file.base_name.clone())
            .or_default()
            .push(file.clone());
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| {
            (&a.version, a.period, &a.raw_name).cmp(&(&b.version, b.period, &b.raw_name))
        });
    }
    FileGroups(groups)
}

/// Return every file that shares `(base_name, version, period)` with at
/// least one other file. Symmetric: all colliding files come back, not
/// just the extras, so the operator sees the full collision.
pub fn find_duplicates(files: &[FileIdentity]) -> Vec<FileIdentity> {
    let mut counts: HashMap<_, usize> = HashMap::new();
    for file in files {
        *counts.entry(file.dedup_key()).or_default() += 1;
    }

    let mut duplicates: Vec<FileIdentity> = files
        .iter()
        .filter(|f| counts.get(&f.dedup_key()).copied().unwrap_or(0) > 1)
        .cloned()
        .collect();
    duplicates.sort_by(|a, b| {
        (&a.base_name, &a.version, a.period, &a.raw_name).cmp(&(
            &b.base_name,
            &b.version,
            b.period,
            &b.raw_name,
        ))
    });
    duplicates
}

/// Return every file involved in a version ambiguity: more than one
/// distinct version present for the same `(base_name, period)` key.
/// A single distinct version per key is not a conflict.
pub fn find_version_conflicts(files: &[FileIdentity]) -> Vec<FileIdentity> {
    let mut versions: HashMap<(&str, Option<u32>), HashSet<_>> = HashMap::new();
    for file in files {
        versions
            .entry((file.base_name.as_str(), file.period))
            .or_default()
            .insert(file.version.clone());
    }

    let mut conflicts: Vec<FileIdentity> = files
        .iter()
        .filter(|f| {
            versions
                .get(&(f.base_name.as_str(), f.period))
                .map(|set| set.len() > 1)
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    conflicts.sort_by(|a, b| {
        (&a.base_name, a.period, &a.version, &a.raw_name).cmp(&(
            &b.base_name,
            b.period,
            &b.version,
            &b.raw_name,
        ))
    });
    conflicts
}

/// Result of diffing candidate files against recorded provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceDiff {
    pub to_load: Vec<FileIdentity>,
    pub to_skip: Vec<FileIdentity>,
}

/// Set-difference of candidates against provenance tags, keyed on
/// `(target_table, raw_name)`.
///
/// A candidate is skipped iff its raw name exactly matches a tag
/// recorded for its resolved target table; matching is exact-string or
/// nothing. `existing_tags` maps table name to the tags it holds.
pub fn diff_against_provenance(
    candidates: &[FileIdentity],
    existing_tags: &HashMap<String, HashSet<String>>,
    table_overrides: &HashMap<String, String>,
) -> Result<ProvenanceDiff, DbError> {
    let mut diff = ProvenanceDiff::default();

    for candidate in candidates {
        let table = target_table(&candidate.base_name, table_overrides)?;
        let already_loaded = existing_tags
            .get(&table)
            .map(|tags| tags.contains(&candidate.raw_name))
            .unwrap_or(false);

        if already_loaded {
            diff.to_skip.push(candidate.clone());
        } else {
            diff.to_load.push(candidate.clone());
        }
    }

    Ok(diff)
}
