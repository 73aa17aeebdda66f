use std::str::FromStr;

use chrono::{DateTime, Utc};
use chronicle_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::entity::{AuditedEntity, EntityType, EntityVariant};

/// Publication lifecycle of one dashboard version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DashboardState {
    /// Being edited; not visible publicly.
    #[default]
    Draft,
    /// Submitted and waiting for a publisher.
    PublishPending,
    /// Publicly visible.
    Published,
    /// Retired from public view.
    Archived,
    /// Superseded by a newer version.
    Inactive,
}

impl DashboardState {
    /// Returns the stored value for this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::PublishPending => "PublishPending",
            Self::Published => "Published",
            Self::Archived => "Archived",
            Self::Inactive => "Inactive",
        }
    }
}

impl FromStr for DashboardState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Draft" => Ok(Self::Draft),
            "PublishPending" => Ok(Self::PublishPending),
            "Published" => Ok(Self::Published),
            "Archived" => Ok(Self::Archived),
            "Inactive" => Ok(Self::Inactive),
            _ => Err(AppError::Validation(format!(
                "unknown dashboard state '{value}'"
            ))),
        }
    }
}

fn default_version() -> u32 {
    1
}

/// One version of a published-or-publishable dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    id: NonEmptyString,
    name: NonEmptyString,
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_dashboard_id: Option<NonEmptyString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic_area_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic_area_name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    state: DashboardState,
    #[serde(default)]
    display_table_of_contents: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    release_notes: Option<String>,
    #[serde(
        default,
        rename = "friendlyURL",
        skip_serializing_if = "Option::is_none"
    )]
    friendly_url: Option<String>,
    created_by: NonEmptyString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    submitted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    archived_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl Dashboard {
    /// Creates a first-version draft dashboard.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        created_by: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            name: NonEmptyString::new(name)?,
            version: default_version(),
            parent_dashboard_id: None,
            topic_area_id: None,
            topic_area_name: None,
            description: String::new(),
            state: DashboardState::Draft,
            display_table_of_contents: false,
            release_notes: None,
            friendly_url: None,
            created_by: NonEmptyString::new(created_by)?,
            updated_by: None,
            submitted_by: None,
            published_by: None,
            archived_by: None,
            created_at: None,
            updated_at: None,
        })
    }

    /// Returns a copy with a new display name.
    pub fn with_name(mut self, name: impl Into<String>) -> AppResult<Self> {
        self.name = NonEmptyString::new(name)?;
        Ok(self)
    }

    /// Returns a copy with a new description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns a copy placed in the given topic area.
    #[must_use]
    pub fn with_topic_area(
        mut self,
        topic_area_id: impl Into<String>,
        topic_area_name: impl Into<String>,
    ) -> Self {
        self.topic_area_id = Some(topic_area_id.into());
        self.topic_area_name = Some(topic_area_name.into());
        self
    }

    /// Returns a copy in the given lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: DashboardState) -> Self {
        self.state = state;
        self
    }

    /// Returns a copy stamped with the writer and write time.
    #[must_use]
    pub fn with_update(mut self, updated_by: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        self.updated_by = Some(updated_by.into());
        self.updated_at = Some(updated_at);
        self
    }

    /// Returns dashboard display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the version number within the dashboard family.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the id shared by every version of this dashboard.
    #[must_use]
    pub fn parent_dashboard_id(&self) -> &NonEmptyString {
        self.parent_dashboard_id.as_ref().unwrap_or(&self.id)
    }

    /// Returns the optional topic area identifier.
    #[must_use]
    pub fn topic_area_id(&self) -> Option<&str> {
        self.topic_area_id.as_deref()
    }

    /// Returns the dashboard description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> DashboardState {
        self.state
    }

    /// Returns the optional friendly URL slug.
    #[must_use]
    pub fn friendly_url(&self) -> Option<&str> {
        self.friendly_url.as_deref()
    }

    /// Returns the creator.
    #[must_use]
    pub fn created_by(&self) -> &NonEmptyString {
        &self.created_by
    }
}

impl EntityVariant for Dashboard {
    const ENTITY_TYPE: EntityType = EntityType::Dashboard;

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
        AuditedEntity::Dashboard(self)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Dashboard, DashboardState};
    use crate::EntityVariant;

    #[test]
    fn dashboard_state_roundtrip_storage_value() {
        for state in [
            DashboardState::Draft,
            DashboardState::PublishPending,
            DashboardState::Published,
            DashboardState::Archived,
            DashboardState::Inactive,
        ] {
            let restored = DashboardState::from_str(state.as_str());
            assert!(restored.is_ok());
            assert_eq!(restored.unwrap_or_default(), state);
        }
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let dashboard = serde_json::from_value::<Dashboard>(serde_json::json!({
            "id": "d1",
            "name": "Unemployment",
            "createdBy": "alice"
        }));
        assert!(dashboard.is_ok());
        let dashboard = dashboard.unwrap_or_else(|_| unreachable!());

        assert_eq!(dashboard.state(), DashboardState::Draft);
        assert_eq!(dashboard.version(), 1);
        assert_eq!(dashboard.parent_dashboard_id().as_str(), "d1");
        assert_eq!(dashboard.description(), "");
        assert_eq!(dashboard.actor(), Some("alice"));
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Dashboard::new("d1", "  ", "alice").is_err());
    }
}
