use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::audit_log_factory::AuditLogFactory;
use crate::audit_log_ports::AuditLogRepository;
use crate::change_feed::ChangeRecord;

mod record;
mod report;

pub use report::{BatchReport, BatchSummary, DiscardReason, RecordOutcome, RecordReport};

/// Subjects processed in parallel when no limit is configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Entry point invoked once per change-feed batch.
///
/// Records for different subjects are processed concurrently up to the
/// configured limit. Records sharing a subject are processed one after the
/// other in feed order, and a failure stops the rest of that subject's
/// records so redelivery replays them in order.
#[derive(Clone)]
pub struct StreamProcessor {
    repository: Arc<dyn AuditLogRepository>,
    factory: AuditLogFactory,
    max_concurrency: usize,
}

impl StreamProcessor {
    /// Creates a stream processor writing to the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self {
            repository,
            factory: AuditLogFactory::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Sets the maximum number of subjects processed in parallel.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Processes one batch to completion.
    pub async fn process_batch(&self, records: Vec<ChangeRecord>) -> BatchReport {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.process_batch_with_cancel(records, cancel_rx).await
    }

    /// Processes one batch, stopping early once `cancel` turns `true`.
    ///
    /// Records already in flight finish; the rest report
    /// [`RecordOutcome::Unprocessed`].
    pub async fn process_batch_with_cancel(
        &self,
        records: Vec<ChangeRecord>,
        cancel: watch::Receiver<bool>,
    ) -> BatchReport {
        let event_ids: Vec<Option<String>> = records
            .iter()
            .map(|record| record.event_id.clone())
            .collect();
        let record_count = records.len();
        let mut outcomes: Vec<Option<RecordOutcome>> = vec![None; record_count];

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        for group in group_by_subject(records) {
            let repository = Arc::clone(&self.repository);
            let factory = self.factory;
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return unprocessed(group);
                };
                process_group(repository.as_ref(), factory, group, &cancel).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(group_outcomes) => {
                    for (index, outcome) in group_outcomes {
                        outcomes[index] = Some(outcome);
                    }
                }
                Err(error) => {
                    warn!(error = %error, "change record processing task aborted");
                }
            }
        }

        let report = BatchReport::new(
            event_ids
                .into_iter()
                .zip(outcomes)
                .map(|(event_id, outcome)| RecordReport {
                    event_id,
                    outcome: outcome.unwrap_or_else(|| RecordOutcome::Failed {
                        subject_id: None,
                        error: "record processing task aborted".to_owned(),
                    }),
                })
                .collect(),
        );

        let summary = report.summary();
        info!(
            received = summary.received,
            appended = summary.appended,
            duplicates = summary.duplicates,
            unclassified = summary.unclassified,
            malformed = summary.malformed,
            failed = summary.failed,
            unprocessed = summary.unprocessed,
            "processed change batch"
        );

        report
    }
}

type IndexedRecords = Vec<(usize, ChangeRecord)>;

/// Splits records by subject, keeping feed order inside each group.
fn group_by_subject(records: Vec<ChangeRecord>) -> Vec<IndexedRecords> {
    let mut groups: Vec<IndexedRecords> = Vec::new();
    let mut group_by_key: HashMap<String, usize> = HashMap::new();

    for (index, record) in records.into_iter().enumerate() {
        match record.subject_partition_key().map(str::to_owned) {
            Some(key) => match group_by_key.get(&key) {
                Some(&group) => groups[group].push((index, record)),
                None => {
                    group_by_key.insert(key, groups.len());
                    groups.push(vec![(index, record)]);
                }
            },
            None => groups.push(vec![(index, record)]),
        }
    }

    groups
}

async fn process_group(
    repository: &dyn AuditLogRepository,
    factory: AuditLogFactory,
    group: IndexedRecords,
    cancel: &watch::Receiver<bool>,
) -> Vec<(usize, RecordOutcome)> {
    let mut outcomes = Vec::with_capacity(group.len());
    let mut blocked = false;

    for (index, record) in group {
        if blocked || *cancel.borrow() {
            outcomes.push((index, RecordOutcome::Unprocessed));
            continue;
        }

        let outcome = record::process_record(repository, factory, &record).await;
        blocked = matches!(outcome, RecordOutcome::Failed { .. });
        outcomes.push((index, outcome));
    }

    outcomes
}

fn unprocessed(group: IndexedRecords) -> Vec<(usize, RecordOutcome)> {
    group
        .into_iter()
        .map(|(index, _)| (index, RecordOutcome::Unprocessed))
        .collect()
}
