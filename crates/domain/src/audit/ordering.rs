use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use chronicle_core::{AppError, AppResult};
use serde::Serialize;

/// Width that feed sequence numbers are zero-padded to.
const SEQUENCE_WIDTH: usize = 40;

/// Deterministic position of one entry within its subject's history.
///
/// Derived from the change feed's own timestamp (millisecond precision) and a
/// tiebreaker taken from the record itself, never from processing time or the
/// writer's clock, so redelivered records map onto the same key. `Ord` agrees
/// with the lexicographic order of [`OrderingKey::sort_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct OrderingKey {
    timestamp: DateTime<Utc>,
    tiebreaker: String,
}

impl OrderingKey {
    /// Creates a key from a timestamp and an alphanumeric tiebreaker.
    pub fn new(timestamp: DateTime<Utc>, tiebreaker: impl Into<String>) -> AppResult<Self> {
        let tiebreaker = tiebreaker.into();
        if tiebreaker.is_empty() || !tiebreaker.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::Validation(format!(
                "ordering key tiebreaker '{tiebreaker}' must be non-empty and alphanumeric"
            )));
        }

        let millis = timestamp.timestamp_millis();
        if millis < 0 {
            return Err(AppError::Validation(format!(
                "ordering key timestamp '{timestamp}' precedes the unix epoch"
            )));
        }

        let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            AppError::Validation(format!("ordering key timestamp '{timestamp}' is out of range"))
        })?;

        Ok(Self {
            timestamp,
            tiebreaker,
        })
    }

    /// Creates a key whose tiebreaker is a feed sequence number.
    pub fn from_sequence_number(
        timestamp: DateTime<Utc>,
        sequence_number: &str,
    ) -> AppResult<Self> {
        if sequence_number.is_empty()
            || sequence_number.len() > SEQUENCE_WIDTH
            || !sequence_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AppError::Validation(format!(
                "sequence number '{sequence_number}' must be 1 to {SEQUENCE_WIDTH} decimal digits"
            )));
        }

        Self::new(
            timestamp,
            format!("{sequence_number:0>width$}", width = SEQUENCE_WIDTH),
        )
    }

    /// Parses a value produced by [`OrderingKey::sort_key`].
    pub fn parse(value: &str) -> AppResult<Self> {
        let Some((millis, tiebreaker)) = value.split_once('#') else {
            return Err(AppError::Validation(format!(
                "ordering key '{value}' has no tiebreaker"
            )));
        };

        let millis = millis.parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid ordering key timestamp '{millis}': {error}"))
        })?;
        let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            AppError::Validation(format!("ordering key timestamp '{millis}' is out of range"))
        })?;

        Self::new(timestamp, tiebreaker)
    }

    /// Returns the feed timestamp truncated to milliseconds.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the tiebreaker.
    #[must_use]
    pub fn tiebreaker(&self) -> &str {
        self.tiebreaker.as_str()
    }

    /// Returns the fixed-width string form that sorts chronologically.
    #[must_use]
    pub fn sort_key(&self) -> String {
        format!("{:020}#{}", self.timestamp.timestamp_millis(), self.tiebreaker)
    }
}

impl From<OrderingKey> for String {
    fn from(value: OrderingKey) -> Self {
        value.sort_key()
    }
}

impl Display for OrderingKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.sort_key().as_str())
    }
}
