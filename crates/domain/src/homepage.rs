use chrono::{DateTime, Utc};
use chronicle_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::entity::{AuditedEntity, EntityType, EntityVariant};

/// Public landing page content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homepage {
    id: NonEmptyString,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl Homepage {
    /// Creates homepage content.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            title: title.into(),
            description: description.into(),
            updated_by: None,
            updated_at: None,
        })
    }

    /// Returns a copy stamped with the writer and write time.
    #[must_use]
    pub fn with_update(mut self, updated_by: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        self.updated_by = Some(updated_by.into());
        self.updated_at = Some(updated_at);
        self
    }

    /// Returns homepage title.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_str()
    }
}

impl EntityVariant for Homepage {
    const ENTITY_TYPE: EntityType = EntityType::Homepage;

    fn id(&self) -> &NonEmptyString {
        &self.id
    }

    fn actor(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn into_audited(self) -> AuditedEntity {
        AuditedEntity::Homepage(self)
    }
}
