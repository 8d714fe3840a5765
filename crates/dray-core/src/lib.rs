//! Dray Core Library
//!
//! Reconciliation and bulk-load engine for CSV report files.
//!
//! The engine turns a directory of structured file names into a set of
//! per-table bulk loads against PostgreSQL:
//!
//! 1. [`identity`] parses raw file names into typed identities
//!    (dataset base name, version, period, compression).
//! 2. [`grouping`] groups identities per dataset, flags duplicates and
//!    ambiguous versions, and diffs candidates against recorded
//!    provenance.
//! 3. [`planner`] resolves the target table and load mode per file.
//! 4. [`loader`] commits each decoded file as one atomic `COPY`,
//!    tagging every row with the source file name and writing an audit
//!    log entry per attempt.
//! 5. [`provenance`] answers which files each table already holds.
//!
//! Everything up to the loader is pure and synchronous; only the
//! database calls in [`db`], [`provenance`] and [`loader`] touch I/O.

pub mod batch;
pub mod db;
pub mod grouping;
pub mod identity;
pub mod loader;
pub mod planner;
pub mod provenance;
pub mod table;

pub use batch::{BatchPlan, ReconcileFindings};
pub use db::{Database, DbError, SOURCE_FILE_COLUMN};
pub use grouping::{
    diff_against_provenance, find_duplicates, find_version_conflicts, group_by_base_name,
    FileGroups, KeyNotFound, ProvenanceDiff,
};
pub use identity::{Compression, FileIdentity, FileVersion, ParseError};
pub use loader::{BulkLoader, LoadError, LoadOutcome};
pub use planner::{plan, LoadDecision, LoadMode, PlanOptions};
pub use provenance::{ProvenanceQuery, TableProvenance};
pub use table::{ColumnDef, ColumnType, DecodedTable};
