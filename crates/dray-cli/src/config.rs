//! CLI configuration
//!
//! Two layers: [`AppConfig`] holds the per-run settings resolved from
//! flags and environment (connection URL, schema, source directory),
//! and [`SourceConfig`] is the optional operator-maintained TOML file
//! mapping datasets to table overrides and full-reload flags. Both are
//! plain values constructed once in `main` and passed down explicitly;
//! there is no ambient global state.

use crate::error::{CliError, Result};
use crate::Cli;
use dray_core::PlanOptions;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Database connection settings, needed by every command that talks
/// to Postgres. The single place where "missing db configuration" is
/// detected and worded.
#[derive(Debug, Clone)]
pub struct DbSettings {
    pub db_url: String,
    pub schema: String,
}

impl DbSettings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let db_url = cli
            .db_url
            .clone()
            .ok_or_else(|| CliError::config("missing database URL (--db-url or DRAY_DATABASE_URL)"))?;
        let schema = cli
            .schema
            .clone()
            .ok_or_else(|| CliError::config("missing schema name (--schema or DRAY_DB_SCHEMA)"))?;
        Ok(Self { db_url, schema })
    }
}

/// Resolve the source directory flag and check it exists.
pub fn resolve_source_dir(cli: &Cli) -> Result<PathBuf> {
    let source_dir = cli
        .source_dir
        .clone()
        .ok_or_else(|| CliError::config("missing source directory (--source-dir or DRAY_SOURCE_DIR)"))?;

    if !source_dir.is_dir() {
        return Err(CliError::config(format!(
            "source directory '{}' does not exist or is not a directory",
            source_dir.display()
        )));
    }
    Ok(source_dir)
}

/// Resolved per-run settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DbSettings,
    pub source_dir: PathBuf,
    pub source_config: Option<PathBuf>,
}

impl AppConfig {
    /// Build from parsed CLI arguments; flags and env have already
    /// been merged by clap.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Ok(Self {
            db: DbSettings::from_cli(cli)?,
            source_dir: resolve_source_dir(cli)?,
            source_config: cli.source_config.clone(),
        })
    }

    /// Load the source config when configured, else defaults.
    pub fn load_source_config(&self) -> Result<SourceConfig> {
        match &self.source_config {
            Some(path) => SourceConfig::from_path(path),
            None => Ok(SourceConfig::default()),
        }
    }
}

/// Per-dataset settings from the source config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Explicit target table; defaults to the sanitized base name.
    pub table: Option<String>,

    /// Truncate the table before this dataset's first file each run.
    #[serde(default)]
    pub full_reload: bool,
}

/// Operator-maintained dataset configuration:
///
/// ```toml
/// [datasets.sales]
/// table = "sales_history"
/// full_reload = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default)]
    pub datasets: HashMap<String, DatasetConfig>,
}

impl SourceConfig {
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CliError::InvalidSourceConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| CliError::InvalidSourceConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Translate into planning inputs, merging datasets flagged for
    /// full reload on the command line for this run only.
    pub fn plan_options(&self, extra_full_reload: &[String]) -> PlanOptions {
        let mut options = PlanOptions::default();

        for (base_name, dataset) in &self.datasets {
            if let Some(table) = &dataset.table {
                options
                    .table_overrides
                    .insert(base_name.clone(), table.clone());
            }
            if dataset.full_reload {
                options.full_reload.insert(base_name.clone());
            }
        }
        for base_name in extra_full_reload {
            options.full_reload.insert(base_name.clone());
        }

        options
    }
}
