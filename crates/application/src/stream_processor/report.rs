use chronicle_domain::HistoryLabel;
use serde::Serialize;

use crate::AppendOutcome;

/// Why a record produced no audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DiscardReason {
    /// No image names an audited entity variant.
    Unclassified,
    /// The record lacks data its event kind requires.
    Malformed(String),
}

/// Terminal state of one change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Record was dropped without an entry.
    Discarded {
        /// Discard cause.
        reason: DiscardReason,
    },
    /// Entry was written, or already present from an earlier delivery.
    Appended {
        /// Subject identifier.
        subject_id: String,
        /// Ordering key sort string.
        ordering_key: String,
        /// History label of the entry.
        label: HistoryLabel,
        /// Whether the store already held the entry.
        append: AppendOutcome,
    },
    /// Processing failed; the batch must be redelivered.
    Failed {
        /// Subject identifier, when the record could be classified.
        subject_id: Option<String>,
        /// Failure description.
        error: String,
    },
    /// Not attempted because the batch was cancelled or an earlier record
    /// for the same subject failed.
    Unprocessed,
}

/// Outcome of one record, keyed by its feed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    /// Feed-assigned record identifier.
    pub event_id: Option<String>,
    /// Terminal state.
    pub outcome: RecordOutcome,
}

/// Per-record outcomes of one batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    records: Vec<RecordReport>,
}

/// Aggregated counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Records received.
    pub received: usize,
    /// Entries newly written.
    pub appended: usize,
    /// Entries already present from an earlier delivery.
    pub duplicates: usize,
    /// Records outside the audited variants.
    pub unclassified: usize,
    /// Records dropped as malformed.
    pub malformed: usize,
    /// Records that failed.
    pub failed: usize,
    /// Records left unprocessed.
    pub unprocessed: usize,
    /// Identifiers to redeliver.
    pub failed_event_ids: Vec<String>,
}

impl BatchReport {
    pub(crate) fn new(records: Vec<RecordReport>) -> Self {
        Self { records }
    }

    /// Returns per-record outcomes in input order.
    #[must_use]
    pub fn records(&self) -> &[RecordReport] {
        self.records.as_slice()
    }

    /// Returns the outcome of the record at `index`.
    #[must_use]
    pub fn outcome(&self, index: usize) -> Option<&RecordOutcome> {
        self.records.get(index).map(|record| &record.outcome)
    }

    /// Returns whether any record needs redelivery.
    #[must_use]
    pub fn needs_redrive(&self) -> bool {
        self.records.iter().any(|record| {
            matches!(
                record.outcome,
                RecordOutcome::Failed { .. } | RecordOutcome::Unprocessed
            )
        })
    }

    /// Returns identifiers of failed and unprocessed records, in input order.
    #[must_use]
    pub fn failed_event_ids(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| {
                matches!(
                    record.outcome,
                    RecordOutcome::Failed { .. } | RecordOutcome::Unprocessed
                )
            })
            .filter_map(|record| record.event_id.clone())
            .collect()
    }

    /// Aggregates the outcomes into counters.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            received: self.records.len(),
            failed_event_ids: self.failed_event_ids(),
            ..BatchSummary::default()
        };

        for record in &self.records {
            match &record.outcome {
                RecordOutcome::Appended {
                    append: AppendOutcome::Inserted,
                    ..
                } => summary.appended += 1,
                RecordOutcome::Appended {
                    append: AppendOutcome::AlreadyPresent,
                    ..
                } => summary.duplicates += 1,
                RecordOutcome::Discarded {
                    reason: DiscardReason::Unclassified,
                } => summary.unclassified += 1,
                RecordOutcome::Discarded {
                    reason: DiscardReason::Malformed(_),
                } => summary.malformed += 1,
                RecordOutcome::Failed { .. } => summary.failed += 1,
                RecordOutcome::Unprocessed => summary.unprocessed += 1,
            }
        }

        summary
    }
}
