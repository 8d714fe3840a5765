//! Dray CLI Library
//!
//! Command-line interface for loading CSV report files into PostgreSQL:
//!
//! - **Scan**: parse and group local files (`dray scan`)
//! - **Status**: per-table provenance report (`dray status`)
//! - **Check**: reconcile local files against the database (`dray check`)
//! - **Load**: bulk-load every eligible file (`dray load`)
//! - **Reset**: drop the target schema (`dray reset --yes`)

pub mod commands;
pub mod config;
pub mod error;
pub mod source;

pub use config::{AppConfig, SourceConfig};
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dray - CSV report reconciliation and bulk loading for PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "dray")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// PostgreSQL connection URL
    #[arg(long, env = "DRAY_DATABASE_URL", global = true)]
    pub db_url: Option<String>,

    /// Target schema name
    #[arg(long, env = "DRAY_DB_SCHEMA", global = true)]
    pub schema: Option<String>,

    /// Directory containing .csv / .csv.gz source files
    #[arg(long, env = "DRAY_SOURCE_DIR", global = true)]
    pub source_dir: Option<PathBuf>,

    /// Optional TOML file with per-dataset table overrides and
    /// full-reload flags
    #[arg(long, env = "DRAY_SOURCE_CONFIG", global = true)]
    pub source_config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse and group source files without touching the database
    Scan,

    /// Show per-table provenance recorded in the database
    Status {
        /// Also show the most recent audit log entries
        #[arg(long, default_value_t = 0, value_name = "N")]
        log: i64,
    },

    /// Reconcile local files against the database (dry run)
    Check,

    /// Bulk-load every new file into its target table
    Load {
        /// Restrict the batch to a single dataset base name
        #[arg(long, value_name = "BASE_NAME")]
        dataset: Option<String>,

        /// Truncate these datasets' tables before their first file
        /// loads (repeatable)
        #[arg(long = "full-reload", value_name = "BASE_NAME")]
        full_reload: Vec<String>,
    },

    /// Drop the target schema and everything in it
    Reset {
        /// Confirm the drop; without this flag nothing happens
        #[arg(long)]
        yes: bool,
    },
}
