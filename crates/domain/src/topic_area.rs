use chrono::{DateTime, Utc};
use chronicle_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::entity::{AuditedEntity, EntityType, EntityVariant};

/// Grouping under which dashboards are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicArea {
    id: NonEmptyString,
    name: NonEmptyString,
    created_by: NonEmptyString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl TopicArea {
    /// Creates a topic area.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        created_by: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            name: NonEmptyString::new(name)?,
            created_by: NonEmptyString::new(created_by)?,
            updated_by: None,
            updated_at: None,
        })
    }

    /// Returns a renamed copy stamped with the writer and write time.
    pub fn renamed(
        mut self,
        name: impl Into<String>,
        updated_by: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        self.name = NonEmptyString::new(name)?;
        self.updated_by = Some(updated_by.into());
        self.updated_at = Some(updated_at);
        Ok(self)
    }

    /// Returns topic area name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }
}

impl EntityVariant for TopicArea {
    const ENTITY_TYPE: EntityType = EntityType::TopicArea;

    fn id(&self) -> &NonEmptyString {
        &self.id
    }

    fn actor(&self) -> Option<&str> {
        self.updated_by
            .as_deref()
            .or(Some(self.created_by.as_str()))
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn into_audited(self) -> AuditedEntity {
        AuditedEntity::TopicArea(self)
    }
}
