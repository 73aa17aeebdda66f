use chrono::{DateTime, Utc};
use chronicle_core::{AppError, AppResult};
use chronicle_domain::{
    AuditEventKind, AuditLogEntry, AuditLogEntryInput, AuditedEntity, OrderingKey, diff,
};
use sha2::{Digest, Sha256};

use crate::change_feed::Row;

/// Record-derived value that orders entries sharing a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tiebreaker {
    /// Feed sequence number, monotonic per key.
    SequenceNumber(String),
    /// Hex SHA-256 over the record content, for feeds without sequence numbers.
    ContentDigest(String),
}

impl Tiebreaker {
    /// Computes a content digest tiebreaker over the record images.
    pub fn digest(
        event: AuditEventKind,
        old_image: Option<&Row>,
        new_image: Option<&Row>,
    ) -> AppResult<Self> {
        let mut hasher = Sha256::new();
        hasher.update(event.as_str().as_bytes());
        for image in [old_image, new_image] {
            hasher.update(b"|");
            if let Some(image) = image {
                let encoded = serde_json::to_vec(image).map_err(|error| {
                    AppError::Internal(format!("failed to encode image for digest: {error}"))
                })?;
                hasher.update(encoded);
            }
        }

        Ok(Self::ContentDigest(hex::encode(hasher.finalize())))
    }

    fn ordering_key(&self, timestamp: DateTime<Utc>) -> AppResult<OrderingKey> {
        match self {
            Self::SequenceNumber(sequence_number) => {
                OrderingKey::from_sequence_number(timestamp, sequence_number)
            }
            Self::ContentDigest(digest) => OrderingKey::new(timestamp, digest.as_str()),
        }
    }
}

/// Builds immutable audit log entries from decoded entity versions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogFactory;

impl AuditLogFactory {
    /// Creates a factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the entry for one mutation.
    ///
    /// `approximate_timestamp` is the feed's mutation time. Together with the
    /// tiebreaker it forms the ordering key, so entries follow feed order even
    /// when writers' clocks disagree. The displayed timestamp is the later of
    /// it and the image's own write time.
    pub fn build(
        &self,
        event: AuditEventKind,
        approximate_timestamp: DateTime<Utc>,
        tiebreaker: &Tiebreaker,
        new_entity: Option<&AuditedEntity>,
        old_entity: Option<&AuditedEntity>,
    ) -> AppResult<AuditLogEntry> {
        let (subject, modified_properties) = match (event, new_entity, old_entity) {
            (AuditEventKind::Create, Some(new_entity), None) => (new_entity, Vec::new()),
            (AuditEventKind::Delete, None, Some(old_entity)) => (old_entity, Vec::new()),
            (AuditEventKind::Update, Some(new_entity), Some(old_entity)) => {
                (new_entity, diff(old_entity, new_entity)?)
            }
            (event, new_entity, old_entity) => {
                return Err(AppError::Contract(format!(
                    "{event} cannot be built from new image present={} and old image present={}",
                    new_entity.is_some(),
                    old_entity.is_some()
                )));
            }
        };

        let timestamp = subject
            .updated_at()
            .map_or(approximate_timestamp, |updated_at| {
                updated_at.max(approximate_timestamp)
            });

        AuditLogEntry::new(AuditLogEntryInput {
            subject: subject.key(),
            event,
            ordering_key: tiebreaker.ordering_key(approximate_timestamp)?,
            timestamp,
            actor: subject.actor().map(str::to_owned),
            modified_properties,
        })
    }
}
