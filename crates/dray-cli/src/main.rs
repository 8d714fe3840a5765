//! Dray CLI - Main entry point

use clap::Parser;
use dray_cli::config::{self, AppConfig, DbSettings};
use dray_cli::error::Result;
use dray_cli::{commands, Cli, Commands};
use dray_common::logging::{init_logging, LogConfig, LogLevel};
use dray_core::Database;
use std::process;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Pick up DRAY_* variables from a local .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    match LogConfig::new(level).with_env_overrides() {
        // Logging is best effort; the CLI still works without it
        Ok(config) => {
            let _ = init_logging(&config);
        }
        Err(e) => eprintln!("Warning: invalid logging configuration: {e}"),
    }

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        // Scan is purely local; it must work with no database configured
        Commands::Scan => {
            let source_dir = config::resolve_source_dir(cli)?;
            commands::scan::run(&source_dir)
        }

        Commands::Status { log } => {
            let db = connect(&DbSettings::from_cli(cli)?).await?;
            let result = commands::status::run(&db, *log).await;
            db.close().await;
            result
        }

        Commands::Check => {
            let config = AppConfig::from_cli(cli)?;
            let db = connect(&config.db).await?;
            let result = commands::check::run(&db, &config).await;
            db.close().await;
            result
        }

        Commands::Load {
            dataset,
            full_reload,
        } => {
            let config = AppConfig::from_cli(cli)?;
            let db = connect(&config.db).await?;
            let result = async {
                db.create_schema_if_absent().await?;
                commands::load::run(&db, &config, dataset.as_deref(), full_reload).await
            }
            .await;
            db.close().await;
            result
        }

        Commands::Reset { yes } => {
            let db = connect(&DbSettings::from_cli(cli)?).await?;
            let result = commands::reset::run(&db, *yes).await;
            db.close().await;
            result
        }
    }
}

/// Open the single-connection pool with a preflight check.
async fn connect(settings: &DbSettings) -> Result<Database> {
    Ok(Database::connect(&settings.db_url, &settings.schema).await?)
}
