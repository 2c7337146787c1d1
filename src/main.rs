//! named-sql - Main entry point.
//!
//! Runs SQL templates with `$name` placeholders against PostgreSQL or SQLite
//! from the command line.

use clap::Parser;
use named_sql::config::{Command, Config, parse_named_arg};
use named_sql::db::{Database, compile, missing_arguments};
use named_sql::models::{ArgValue, NamedArgs};
use named_sql::{DbError, DbResult};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays machine-readable
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Parse `--arg name=<json>` values into named arguments.
fn build_args(raw: &[String]) -> DbResult<NamedArgs> {
    let mut args = NamedArgs::new();
    for item in raw {
        let (name, json) = parse_named_arg(item).map_err(DbError::invalid_input)?;
        let value = ArgValue::try_from(json)
            .map_err(|e| DbError::invalid_input(format!("--arg {}: {}", name, e)))?;
        args.insert(name, value);
    }
    Ok(args)
}

/// Fail with every unresolved placeholder, not just the first.
fn check_arguments(sql: &str, args: &NamedArgs) -> DbResult<()> {
    let missing = missing_arguments(sql, args);
    if missing.is_empty() {
        return Ok(());
    }
    let names = missing
        .iter()
        .map(|name| format!("${}", name))
        .collect::<Vec<_>>()
        .join(", ");
    Err(DbError::invalid_input(format!(
        "Missing --arg for placeholders: {}",
        names
    )))
}

fn print_json<T: serde::Serialize>(value: &T) -> DbResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DbError::internal(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

async fn connect(config: &Config) -> DbResult<Database> {
    let url = config.database.as_deref().ok_or_else(|| {
        DbError::invalid_input("No database configured; pass --database or set NAMED_SQL_DATABASE")
    })?;
    Database::connect(url).await
}

async fn run(config: &Config) -> DbResult<bool> {
    match &config.command {
        Command::Compile { sql, args } => {
            let args = build_args(args)?;
            check_arguments(sql, &args)?;
            let compiled = compile(sql, &args)?;
            print_json(&compiled)?;
            Ok(true)
        }
        Command::Ping => {
            let db = connect(config).await?;
            let result = db.ping().await;
            db.disconnect().await?;

            let ok = result.unwrap_or_else(|e| {
                error!(error = %e, "Ping failed");
                false
            });
            println!("{}", if ok { "ok" } else { "failed" });
            Ok(ok)
        }
        Command::Query { sql, args } => {
            let args = build_args(args)?;
            check_arguments(sql, &args)?;
            let db = connect(config).await?;
            let result = db.named_query(sql, &args).await;
            db.disconnect().await?;

            let rows = result?;
            info!(rows = rows.row_count(), rows_affected = rows.rows_affected, "Query complete");
            print_json(&rows)?;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_tracing(&config);

    match run(&config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}
