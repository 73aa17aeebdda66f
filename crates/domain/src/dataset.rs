use chrono::{DateTime, Utc};
use chronicle_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::entity::{AuditedEntity, EntityType, EntityVariant};

/// Sensitivity classification attached to a dataset.
///
/// Rows written before classification existed carry no value and decode as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataClassification {
    /// Not classified.
    #[default]
    None,
    /// Internal use only.
    Internal,
    /// Restricted distribution.
    Restricted,
}

/// Object storage locations of one dataset's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStorageKeys {
    /// Key of the file as uploaded.
    pub raw: String,
    /// Key of the normalized JSON rendition.
    pub json: String,
}

/// A dataset backing one or more dashboard widgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    id: NonEmptyString,
    name: NonEmptyString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default)]
    classification: DataClassification,
    #[serde(default, rename = "s3Key", skip_serializing_if = "Option::is_none")]
    storage_keys: Option<DatasetStorageKeys>,
    created_by: NonEmptyString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl Dataset {
    /// Creates an unclassified dataset.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        created_by: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            name: NonEmptyString::new(name)?,
            file_name: None,
            summary: None,
            classification: DataClassification::None,
            storage_keys: None,
            created_by: NonEmptyString::new(created_by)?,
            updated_at: None,
        })
    }

    /// Returns a copy with the given summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Returns a copy with the given classification.
    #[must_use]
    pub fn with_classification(mut self, classification: DataClassification) -> Self {
        self.classification = classification;
        self
    }

    /// Returns a copy pointing at the given stored files.
    #[must_use]
    pub fn with_storage_keys(mut self, storage_keys: DatasetStorageKeys) -> Self {
        self.storage_keys = Some(storage_keys);
        self
    }

    /// Returns a copy stamped with the write time.
    #[must_use]
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Returns dataset name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the dataset classification.
    #[must_use]
    pub fn classification(&self) -> DataClassification {
        self.classification
    }

    /// Returns the stored file locations, when uploaded.
    #[must_use]
    pub fn storage_keys(&self) -> Option<&DatasetStorageKeys> {
        self.storage_keys.as_ref()
    }
}

impl EntityVariant for Dataset {
    const ENTITY_TYPE: EntityType = EntityType::Dataset;

    fn id(&self) -> &NonEmptyString {
        &self.id
    }

    fn actor(&self) -> Option<&str> {
        Some(self.created_by.as_str())
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn into_audited(self) -> AuditedEntity {
        AuditedEntity::Dataset(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{DataClassification, Dataset};

    #[test]
    fn missing_classification_defaults_to_none() {
        let dataset = serde_json::from_value::<Dataset>(serde_json::json!({
            "id": "ds1",
            "name": "Claims",
            "createdBy": "bob",
            "s3Key": { "raw": "raw/claims.csv", "json": "json/claims.json" }
        }));
        assert!(dataset.is_ok());
        let dataset = dataset.unwrap_or_else(|_| unreachable!());

        assert_eq!(dataset.classification(), DataClassification::None);
        assert_eq!(
            dataset.storage_keys().map(|keys| keys.json.as_str()),
            Some("json/claims.json")
        );
    }
}
