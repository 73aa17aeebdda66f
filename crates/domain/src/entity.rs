use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chronicle_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Dashboard, Dataset, Homepage, TopicArea};

/// Closed set of entity variants whose mutations are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// Dashboard definitions, including every version of a dashboard.
    Dashboard,
    /// Uploaded or ingested datasets.
    Dataset,
    /// Topic areas grouping dashboards.
    TopicArea,
    /// The singleton public homepage.
    Homepage,
}

impl EntityType {
    /// Returns the discriminator value stored in the `type` attribute.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Dataset => "Dataset",
            Self::TopicArea => "TopicArea",
            Self::Homepage => "Homepage",
        }
    }

    /// Returns all audited variants.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[EntityType] = &[
            EntityType::Dashboard,
            EntityType::Dataset,
            EntityType::TopicArea,
            EntityType::Homepage,
        ];

        ALL
    }

    /// Maps a row discriminator onto an audited variant.
    ///
    /// Returns `None` for discriminators outside the audited set, which are
    /// not errors: the shared table also carries join rows, widgets and counters.
    #[must_use]
    pub fn from_discriminator(value: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|entity_type| entity_type.as_str() == value)
    }
}

impl FromStr for EntityType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_discriminator(value)
            .ok_or_else(|| AppError::Validation(format!("unknown entity type '{value}'")))
    }
}

impl Display for EntityType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Storage identity of one entity: `<Type>#<id>` partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    entity_type: EntityType,
    id: NonEmptyString,
}

impl EntityKey {
    /// Creates a key for an entity of the given type.
    #[must_use]
    pub fn new(entity_type: EntityType, id: NonEmptyString) -> Self {
        Self { entity_type, id }
    }

    /// Parses a `<Type>#<id>` partition key.
    pub fn parse(value: &str) -> AppResult<Self> {
        let Some((entity_type, id)) = value.split_once('#') else {
            return Err(AppError::Validation(format!(
                "partition key '{value}' is not of the form <Type>#<id>"
            )));
        };

        Ok(Self {
            entity_type: EntityType::from_str(entity_type)?,
            id: NonEmptyString::new(id)?,
        })
    }

    /// Returns the entity variant.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Returns the identifier unique within the variant.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the partition key, also used as the audit subject identifier.
    #[must_use]
    pub fn partition_key(&self) -> String {
        format!("{}#{}", self.entity_type.as_str(), self.id.as_str())
    }
}

impl Display for EntityKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}#{}", self.entity_type.as_str(), self.id.as_str())
    }
}

/// Capabilities every audited entity variant exposes to the pipeline.
pub trait EntityVariant {
    /// Discriminator of this variant.
    const ENTITY_TYPE: EntityType;

    /// Returns the identifier unique within the variant.
    fn id(&self) -> &NonEmptyString;

    /// Returns who performed the latest mutation, when recorded.
    fn actor(&self) -> Option<&str>;

    /// Returns the bookkeeping timestamp of the latest write.
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    /// Wraps the variant into the closed entity enum.
    fn into_audited(self) -> AuditedEntity;
}

/// One decoded entity version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditedEntity {
    /// Dashboard version.
    Dashboard(Dashboard),
    /// Dataset version.
    Dataset(Dataset),
    /// Topic area version.
    TopicArea(TopicArea),
    /// Homepage version.
    Homepage(Homepage),
}

impl AuditedEntity {
    /// Returns the entity variant.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Dashboard(_) => EntityType::Dashboard,
            Self::Dataset(_) => EntityType::Dataset,
            Self::TopicArea(_) => EntityType::TopicArea,
            Self::Homepage(_) => EntityType::Homepage,
        }
    }

    /// Returns the storage key of the entity.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        let id = match self {
            Self::Dashboard(entity) => entity.id(),
            Self::Dataset(entity) => entity.id(),
            Self::TopicArea(entity) => entity.id(),
            Self::Homepage(entity) => entity.id(),
        };

        EntityKey::new(self.entity_type(), id.clone())
    }

    /// Returns who performed the latest mutation, when recorded.
    #[must_use]
    pub fn actor(&self) -> Option<&str> {
        match self {
            Self::Dashboard(entity) => entity.actor(),
            Self::Dataset(entity) => entity.actor(),
            Self::TopicArea(entity) => entity.actor(),
            Self::Homepage(entity) => entity.actor(),
        }
    }

    /// Returns the bookkeeping timestamp of the latest write.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Dashboard(entity) => entity.updated_at(),
            Self::Dataset(entity) => entity.updated_at(),
            Self::TopicArea(entity) => entity.updated_at(),
            Self::Homepage(entity) => entity.updated_at(),
        }
    }

    /// Serializes the entity into its named properties, in declaration order.
    pub fn properties(&self) -> AppResult<Map<String, Value>> {
        let value = match self {
            Self::Dashboard(entity) => serde_json::to_value(entity),
            Self::Dataset(entity) => serde_json::to_value(entity),
            Self::TopicArea(entity) => serde_json::to_value(entity),
            Self::Homepage(entity) => serde_json::to_value(entity),
        }
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize {} properties: {error}",
                self.entity_type()
            ))
        })?;

        match value {
            Value::Object(properties) => Ok(properties),
            other => Err(AppError::Internal(format!(
                "{} serialized to a non-object value: {other}",
                self.entity_type()
            ))),
        }
    }
}
