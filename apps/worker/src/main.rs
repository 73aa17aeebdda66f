//! Chronicle change-feed batch runner.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;

use chronicle_application::{
    AuditLogRepository, ChangeBatch, DEFAULT_MAX_CONCURRENCY, StreamProcessor,
};
use chronicle_core::{AppError, AppResult};
use chronicle_infrastructure::{AuditTableName, PostgresAuditLogRepository};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: chronicle-worker process [BATCH_FILE...] | history <SUBJECT_ID>";

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    table_name: AuditTableName,
    max_concurrency: usize,
    max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Process { batch_files: Vec<String> },
    History { subject_id: String },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = Command::parse(env::args().skip(1))?;
    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str(), config.max_connections).await?;
    let repository = Arc::new(PostgresAuditLogRepository::new(
        pool,
        config.table_name.clone(),
    ));
    repository.ensure_schema().await?;

    info!(
        table = %config.table_name.as_str(),
        max_concurrency = config.max_concurrency,
        "chronicle-worker started"
    );

    match command {
        Command::Process { batch_files } => {
            let processor =
                StreamProcessor::new(repository).with_max_concurrency(config.max_concurrency);
            process_batches(&processor, batch_files).await
        }
        Command::History { subject_id } => {
            print_history(repository.as_ref(), subject_id.as_str()).await
        }
    }
}

async fn process_batches(processor: &StreamProcessor, batch_files: Vec<String>) -> AppResult<()> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight batch");
            let _ = cancel_tx.send(true);
        }
    });

    let sources = if batch_files.is_empty() {
        vec![None]
    } else {
        batch_files.into_iter().map(Some).collect()
    };

    let mut redrive_count = 0_usize;
    for source in sources {
        if *cancel_rx.borrow() {
            break;
        }

        let batch = read_batch(source.as_deref()).await?;
        let report = processor
            .process_batch_with_cancel(batch.records, cancel_rx.clone())
            .await;
        let summary = report.summary();
        redrive_count = redrive_count.saturating_add(summary.failed_event_ids.len());

        let rendered = serde_json::to_string(&summary).map_err(|error| {
            AppError::Internal(format!("failed to render batch summary: {error}"))
        })?;
        println!("{rendered}");
    }

    if redrive_count > 0 {
        return Err(AppError::Internal(format!(
            "{redrive_count} change records need redelivery"
        )));
    }

    Ok(())
}

async fn read_batch(source: Option<&str>) -> AppResult<ChangeBatch> {
    let (label, payload) = match source {
        Some(path) => {
            let payload = tokio::fs::read_to_string(path).await.map_err(|error| {
                AppError::Internal(format!("failed to read batch file '{path}': {error}"))
            })?;
            (path, payload)
        }
        None => {
            let mut payload = String::new();
            tokio::io::stdin()
                .read_to_string(&mut payload)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to read batch from stdin: {error}"))
                })?;
            ("<stdin>", payload)
        }
    };

    serde_json::from_str::<ChangeBatch>(payload.as_str()).map_err(|error| {
        AppError::Validation(format!("invalid change batch in '{label}': {error}"))
    })
}

async fn print_history(
    repository: &PostgresAuditLogRepository,
    subject_id: &str,
) -> AppResult<()> {
    for entry in repository.list_history(subject_id).await? {
        let rendered = serde_json::to_string(&entry).map_err(|error| {
            AppError::Internal(format!("failed to render audit log entry: {error}"))
        })?;
        println!("{rendered}");
    }

    Ok(())
}

async fn connect_pool(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> AppResult<Self> {
        match args.next().as_deref() {
            Some("process") => Ok(Self::Process {
                batch_files: args.collect(),
            }),
            Some("history") => {
                let subject_id = args
                    .next()
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| AppError::Validation(USAGE.to_owned()))?;
                Ok(Self::History { subject_id })
            }
            _ => Err(AppError::Validation(USAGE.to_owned())),
        }
    }
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let table_name = match env::var("AUDIT_LOG_TABLE") {
            Ok(value) => AuditTableName::new(value.trim())?,
            Err(_) => AuditTableName::default(),
        };
        let max_concurrency = parse_env_usize("AUDIT_STREAM_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?;
        let max_connections = parse_env_u32("AUDIT_DATABASE_MAX_CONNECTIONS", 5)?;

        if max_concurrency == 0 {
            return Err(AppError::Validation(
                "AUDIT_STREAM_CONCURRENCY must be greater than zero".to_owned(),
            ));
        }

        if max_connections == 0 {
            return Err(AppError::Validation(
                "AUDIT_DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            table_name,
            max_concurrency,
            max_connections,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::Command;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| (*value).to_owned())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn process_command_collects_batch_files() {
        let command = Command::parse(args(&["process", "a.json", "b.json"]));
        assert!(matches!(
            command,
            Ok(Command::Process { ref batch_files }) if batch_files.len() == 2
        ));
    }

    #[test]
    fn history_command_requires_subject() {
        assert!(Command::parse(args(&["history"])).is_err());
        assert!(Command::parse(args(&["history", "Dashboard#d1"])).is_ok());
        assert!(Command::parse(args(&[])).is_err());
    }
}
