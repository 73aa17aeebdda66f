use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chronicle_core::{AppError, AppResult};
use chronicle_domain::AuditEventKind;
use serde::{Deserialize, Serialize};

/// Attribute holding the row partition key.
pub const PARTITION_KEY_ATTRIBUTE: &str = "pk";
/// Attribute holding the row sort key.
pub const SORT_KEY_ATTRIBUTE: &str = "sk";
/// Attribute holding the row discriminator.
pub const DISCRIMINATOR_ATTRIBUTE: &str = "type";

/// One storage value with its explicit primitive-type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    #[serde(rename = "S")]
    String(String),
    /// Number, carried as its decimal string form.
    #[serde(rename = "N")]
    Number(String),
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Explicit null marker.
    #[serde(rename = "NULL")]
    Null(bool),
    /// Nested map.
    #[serde(rename = "M")]
    Map(BTreeMap<String, AttributeValue>),
    /// Ordered list.
    #[serde(rename = "L")]
    List(Vec<AttributeValue>),
    /// Set of strings.
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    /// Set of numbers.
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
}

impl AttributeValue {
    /// Returns the string payload of an `S` value.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Flat storage representation of one entity version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, AttributeValue>);

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.0.insert(name.into(), value);
    }

    /// Returns one attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    /// Iterates attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    /// Returns the partition key, when it is a string.
    #[must_use]
    pub fn partition_key(&self) -> Option<&str> {
        self.get(PARTITION_KEY_ATTRIBUTE)
            .and_then(AttributeValue::as_string)
    }

    /// Returns the `type` discriminator, when it is a string.
    #[must_use]
    pub fn discriminator(&self) -> Option<&str> {
        self.get(DISCRIMINATOR_ATTRIBUTE)
            .and_then(AttributeValue::as_string)
    }
}

impl FromIterator<(String, AttributeValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Mutation name as emitted by the storage change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedEventName {
    /// Row inserted.
    #[serde(rename = "INSERT")]
    Insert,
    /// Row modified.
    #[serde(rename = "MODIFY")]
    Modify,
    /// Row removed.
    #[serde(rename = "REMOVE")]
    Remove,
    /// Any name this pipeline does not understand.
    #[serde(other)]
    Unknown,
}

/// Stream payload of one change record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Mutation time in epoch seconds, as stamped by the feed.
    #[serde(
        rename = "ApproximateCreationDateTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub approximate_creation_date_time: Option<f64>,
    /// Per-key monotonically increasing sequence number.
    #[serde(
        rename = "SequenceNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence_number: Option<String>,
    /// Row before the mutation.
    #[serde(rename = "OldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Row>,
    /// Row after the mutation.
    #[serde(rename = "NewImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Row>,
}

/// One raw change record delivered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Feed-assigned record identifier, used for partial-batch redrive.
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Mutation name.
    #[serde(rename = "eventName")]
    pub event_name: FeedEventName,
    /// Images and sequencing data.
    #[serde(default)]
    pub dynamodb: StreamRecord,
}

impl ChangeRecord {
    /// Maps the feed mutation name onto an audit event kind.
    pub fn event_kind(&self) -> AppResult<AuditEventKind> {
        match self.event_name {
            FeedEventName::Insert => Ok(AuditEventKind::Create),
            FeedEventName::Modify => Ok(AuditEventKind::Update),
            FeedEventName::Remove => Ok(AuditEventKind::Delete),
            FeedEventName::Unknown => Err(AppError::Malformed(
                "record carries an unknown event name".to_owned(),
            )),
        }
    }

    /// Returns the feed timestamp of the mutation.
    pub fn approximate_timestamp(&self) -> AppResult<DateTime<Utc>> {
        let seconds = self
            .dynamodb
            .approximate_creation_date_time
            .ok_or_else(|| {
                AppError::Malformed("record carries no approximate creation time".to_owned())
            })?;

        if !seconds.is_finite() || seconds < 0.0 {
            return Err(AppError::Malformed(format!(
                "approximate creation time '{seconds}' is not a valid epoch time"
            )));
        }

        DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64).ok_or_else(|| {
            AppError::Malformed(format!(
                "approximate creation time '{seconds}' is out of range"
            ))
        })
    }

    /// Returns the partition key of whichever image is present.
    #[must_use]
    pub fn subject_partition_key(&self) -> Option<&str> {
        self.dynamodb
            .new_image
            .as_ref()
            .and_then(Row::partition_key)
            .or_else(|| self.dynamodb.old_image.as_ref().and_then(Row::partition_key))
    }
}

/// One change-feed invocation payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Records in feed order.
    #[serde(rename = "Records", default)]
    pub records: Vec<ChangeRecord>,
}

#[cfg(test)]
mod tests;
