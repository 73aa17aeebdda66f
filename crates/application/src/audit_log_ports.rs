use async_trait::async_trait;
use chronicle_core::AppResult;
use chronicle_domain::AuditLogEntry;
use serde::Serialize;

/// Result of appending one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendOutcome {
    /// Entry was stored.
    Inserted,
    /// An entry with the same subject and ordering key was already stored.
    AlreadyPresent,
}

/// Port for the append-only audit history store.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Appends one entry; appending an equivalent entry again is a no-op.
    async fn append(&self, entry: AuditLogEntry) -> AppResult<AppendOutcome>;

    /// Returns every entry for one subject, most recent first.
    async fn list_history(&self, subject_id: &str) -> AppResult<Vec<AuditLogEntry>>;
}
