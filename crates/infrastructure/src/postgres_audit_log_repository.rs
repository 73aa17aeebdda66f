use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;

use chronicle_application::{AppendOutcome, AuditLogRepository};
use chronicle_core::{AppError, AppResult};
use chronicle_domain::{
    AuditEventKind, AuditLogEntry, AuditLogEntryInput, EntityKey, OrderingKey, PropertyChange,
};

const TABLE_NAME_MAX_LENGTH: usize = 63;

/// Validated name of the table holding audit log entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditTableName(String);

impl AuditTableName {
    /// Validates a plain, unquoted SQL identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let mut chars = value.chars();
        let starts_well = chars
            .next()
            .is_some_and(|first| first.is_ascii_lowercase() || first == '_');
        let rest_valid = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !starts_well || !rest_valid || value.len() > TABLE_NAME_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "audit table name '{value}' must be a lowercase SQL identifier of at most {TABLE_NAME_MAX_LENGTH} characters"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for AuditTableName {
    fn default() -> Self {
        Self("audit_log_entries".to_owned())
    }
}

/// PostgreSQL-backed append-only audit log repository.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
    table_name: AuditTableName,
}

impl PostgresAuditLogRepository {
    /// Creates a repository writing to the given table.
    #[must_use]
    pub fn new(pool: PgPool, table_name: AuditTableName) -> Self {
        Self { pool, table_name }
    }

    /// Creates the audit table and its history index when absent.
    pub async fn ensure_schema(&self) -> AppResult<()> {
        let table = self.table_name.as_str();
        let statement = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                subject_id TEXT NOT NULL,
                ordering_key TEXT COLLATE "C" NOT NULL,
                entry_id UUID NOT NULL,
                entity_type TEXT NOT NULL,
                event TEXT NOT NULL,
                actor TEXT,
                occurred_at TIMESTAMPTZ NOT NULL,
                modified_properties JSONB NOT NULL DEFAULT '[]'::JSONB,
                label TEXT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (subject_id, ordering_key)
            )
            "#
        );

        sqlx::query(statement.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to create audit table '{table}': {error}"))
            })?;

        info!(table, "audit log schema ready");
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    subject_id: String,
    ordering_key: String,
    event: String,
    actor: Option<String>,
    occurred_at: DateTime<Utc>,
    modified_properties: Json<Vec<PropertyChange>>,
}

impl AuditLogRow {
    fn into_entry(self) -> AppResult<AuditLogEntry> {
        let corrupt = |error: AppError| {
            AppError::Internal(format!(
                "stored audit entry '{}' at '{}' is invalid: {error}",
                self.subject_id, self.ordering_key
            ))
        };

        AuditLogEntry::new(AuditLogEntryInput {
            subject: EntityKey::parse(self.subject_id.as_str()).map_err(corrupt)?,
            event: AuditEventKind::from_str(self.event.as_str()).map_err(corrupt)?,
            ordering_key: OrderingKey::parse(self.ordering_key.as_str()).map_err(corrupt)?,
            timestamp: self.occurred_at,
            actor: self.actor.clone(),
            modified_properties: self.modified_properties.0.clone(),
        })
        .map_err(corrupt)
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn append(&self, entry: AuditLogEntry) -> AppResult<AppendOutcome> {
        let statement = format!(
            r#"
            INSERT INTO {} (
                subject_id,
                ordering_key,
                entry_id,
                entity_type,
                event,
                actor,
                occurred_at,
                modified_properties,
                label
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (subject_id, ordering_key) DO NOTHING
            "#,
            self.table_name.as_str()
        );

        let result = sqlx::query(statement.as_str())
            .bind(entry.subject_id().as_str())
            .bind(entry.ordering_key().sort_key())
            .bind(entry.entry_id())
            .bind(entry.entity_type().as_str())
            .bind(entry.event().as_str())
            .bind(entry.actor())
            .bind(entry.timestamp())
            .bind(Json(entry.modified_properties()))
            .bind(entry.label().as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to append audit log entry for '{}': {error}",
                    entry.subject_id()
                ))
            })?;

        if result.rows_affected() == 0 {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        Ok(AppendOutcome::Inserted)
    }

    async fn list_history(&self, subject_id: &str) -> AppResult<Vec<AuditLogEntry>> {
        let statement = format!(
            r#"
            SELECT
                subject_id,
                ordering_key,
                event,
                actor,
                occurred_at,
                modified_properties
            FROM {}
            WHERE subject_id = $1
            ORDER BY ordering_key COLLATE "C" DESC
            "#,
            self.table_name.as_str()
        );

        let rows = sqlx::query_as::<_, AuditLogRow>(statement.as_str())
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list audit history for '{subject_id}': {error}"
                ))
            })?;

        rows.into_iter().map(AuditLogRow::into_entry).collect()
    }
}

#[cfg(test)]
mod tests;
