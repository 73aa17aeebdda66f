use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use chronicle_application::{AppendOutcome, AuditLogRepository};
use chronicle_core::AppResult;
use chronicle_domain::AuditLogEntry;

/// In-memory audit log repository keyed by subject and ordering key.
#[derive(Debug, Default)]
pub struct InMemoryAuditLogRepository {
    entries: RwLock<BTreeMap<(String, String), AuditLogEntry>>,
}

impl InMemoryAuditLogRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn append(&self, entry: AuditLogEntry) -> AppResult<AppendOutcome> {
        let key = (
            entry.subject_id().as_str().to_owned(),
            entry.ordering_key().sort_key(),
        );
        let mut entries = self.entries.write().await;

        if entries.contains_key(&key) {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        entries.insert(key, entry);
        Ok(AppendOutcome::Inserted)
    }

    async fn list_history(&self, subject_id: &str) -> AppResult<Vec<AuditLogEntry>> {
        let entries = self.entries.read().await;

        Ok(entries
            .range((subject_id.to_owned(), String::new())..)
            .take_while(|((stored_subject_id, _), _)| stored_subject_id == subject_id)
            .map(|(_, entry)| entry.clone())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect())
    }
}
