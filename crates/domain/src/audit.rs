use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use chronicle_core::{AppError, AppResult, NonEmptyString};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{EntityKey, EntityType};

mod diff;
mod label;
mod ordering;

pub use diff::{BOOKKEEPING_PROPERTIES, PropertyChange, diff, diff_properties};
pub use label::{HistoryLabel, STATE_PROPERTY};
pub use ordering::OrderingKey;

const ENTRY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b2f_52c4_0d1e_4a8f_9f35_3c1d_7e02_a9b4);

/// Kind of mutation observed on the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuditEventKind {
    /// Entity was created.
    Create,
    /// Entity was modified in place.
    Update,
    /// Entity was removed.
    Delete,
}

impl AuditEventKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

impl FromStr for AuditEventKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Create" => Ok(Self::Create),
            "Update" => Ok(Self::Update),
            "Delete" => Ok(Self::Delete),
            _ => Err(AppError::Validation(format!(
                "unknown audit event kind '{value}'"
            ))),
        }
    }
}

impl Display for AuditEventKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Fields required to build one audit log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntryInput {
    /// Entity the entry describes.
    pub subject: EntityKey,
    /// Mutation kind.
    pub event: AuditEventKind,
    /// Deterministic position within the subject's history.
    pub ordering_key: OrderingKey,
    /// When the mutation happened, as shown in history.
    pub timestamp: DateTime<Utc>,
    /// Who performed the mutation, when derivable.
    pub actor: Option<String>,
    /// Property-level changes; only updates may carry any.
    pub modified_properties: Vec<PropertyChange>,
}

/// Immutable history entry for one entity mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    entry_id: Uuid,
    subject_id: NonEmptyString,
    entity_type: EntityType,
    ordering_key: OrderingKey,
    event: AuditEventKind,
    actor: Option<String>,
    timestamp: DateTime<Utc>,
    modified_properties: Vec<PropertyChange>,
    label: HistoryLabel,
}

impl AuditLogEntry {
    /// Creates a validated entry and derives its history label.
    pub fn new(input: AuditLogEntryInput) -> AppResult<Self> {
        if input.event != AuditEventKind::Update && !input.modified_properties.is_empty() {
            return Err(AppError::Contract(format!(
                "{} entries must not carry modified properties",
                input.event
            )));
        }

        let subject_id = NonEmptyString::new(input.subject.partition_key())?;
        let entry_id = Uuid::new_v5(
            &ENTRY_ID_NAMESPACE,
            format!("{}|{}", subject_id, input.ordering_key.sort_key()).as_bytes(),
        );
        let label = HistoryLabel::derive(input.event, &input.modified_properties);

        Ok(Self {
            entry_id,
            subject_id,
            entity_type: input.subject.entity_type(),
            timestamp: input.timestamp.trunc_subsecs(3),
            ordering_key: input.ordering_key,
            event: input.event,
            actor: input.actor.filter(|actor| !actor.trim().is_empty()),
            modified_properties: input.modified_properties,
            label,
        })
    }

    /// Returns the identifier derived from subject and ordering key.
    #[must_use]
    pub fn entry_id(&self) -> Uuid {
        self.entry_id
    }

    /// Returns the subject identifier (entity partition key).
    #[must_use]
    pub fn subject_id(&self) -> &NonEmptyString {
        &self.subject_id
    }

    /// Returns the subject's entity variant.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Returns the ordering key.
    #[must_use]
    pub fn ordering_key(&self) -> &OrderingKey {
        &self.ordering_key
    }

    /// Returns the mutation kind.
    #[must_use]
    pub fn event(&self) -> AuditEventKind {
        self.event
    }

    /// Returns the actor, when derivable.
    #[must_use]
    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Returns when the mutation happened.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns property-level changes.
    #[must_use]
    pub fn modified_properties(&self) -> &[PropertyChange] {
        self.modified_properties.as_slice()
    }

    /// Returns the human-readable action summary.
    #[must_use]
    pub fn label(&self) -> HistoryLabel {
        self.label
    }
}

#[cfg(test)]
mod tests;
