use chronicle_core::{AppError, AppResult};
use chronicle_domain::{AuditEventKind, AuditedEntity};
use tracing::{debug, warn};

use crate::audit_log_factory::{AuditLogFactory, Tiebreaker};
use crate::change_feed::ChangeRecord;
use crate::entity_codec::decode;
use crate::{AuditLogRepository, DiscardReason, RecordOutcome};

const SEQUENCE_NUMBER_MAX_DIGITS: usize = 40;

struct DecodedRecord {
    event: AuditEventKind,
    approximate_timestamp: chrono::DateTime<chrono::Utc>,
    tiebreaker: Tiebreaker,
    new_entity: Option<AuditedEntity>,
    old_entity: Option<AuditedEntity>,
}

/// Drives one record from classification to append.
pub(super) async fn process_record(
    repository: &dyn AuditLogRepository,
    factory: AuditLogFactory,
    record: &ChangeRecord,
) -> RecordOutcome {
    let event_id = record.event_id.as_deref().unwrap_or("<none>");
    let subject_id = record.subject_partition_key().map(str::to_owned);

    let decoded = match classify(record) {
        Ok(Some(decoded)) => decoded,
        Ok(None) => {
            debug!(event_id, "discarded record outside audited entity types");
            return RecordOutcome::Discarded {
                reason: DiscardReason::Unclassified,
            };
        }
        Err(AppError::Malformed(reason)) => {
            warn!(event_id, reason = %reason, "discarded malformed change record");
            return RecordOutcome::Discarded {
                reason: DiscardReason::Malformed(reason),
            };
        }
        Err(error) => {
            warn!(event_id, error = %error, "failed to classify change record");
            return RecordOutcome::Failed {
                subject_id,
                error: error.to_string(),
            };
        }
    };

    let entry = match factory.build(
        decoded.event,
        decoded.approximate_timestamp,
        &decoded.tiebreaker,
        decoded.new_entity.as_ref(),
        decoded.old_entity.as_ref(),
    ) {
        Ok(entry) => entry,
        Err(error) => {
            warn!(event_id, error = %error, "failed to build audit log entry");
            return RecordOutcome::Failed {
                subject_id,
                error: error.to_string(),
            };
        }
    };

    let subject_id = entry.subject_id().as_str().to_owned();
    let ordering_key = entry.ordering_key().sort_key();
    let label = entry.label();

    match repository.append(entry).await {
        Ok(append) => {
            debug!(
                event_id,
                subject_id = %subject_id,
                ordering_key = %ordering_key,
                event = %decoded.event,
                "appended audit log entry"
            );
            RecordOutcome::Appended {
                subject_id,
                ordering_key,
                label,
                append,
            }
        }
        Err(error) => {
            warn!(
                event_id,
                subject_id = %subject_id,
                ordering_key = %ordering_key,
                error = %error,
                "failed to append audit log entry"
            );
            RecordOutcome::Failed {
                subject_id: Some(subject_id),
                error: error.to_string(),
            }
        }
    }
}

fn classify(record: &ChangeRecord) -> AppResult<Option<DecodedRecord>> {
    let old_image = record.dynamodb.old_image.as_ref();
    let new_image = record.dynamodb.new_image.as_ref();

    if old_image.is_none() && new_image.is_none() {
        return Err(AppError::Malformed("record carries no images".to_owned()));
    }

    let old_entity = old_image.map(decode).transpose()?.flatten();
    let new_entity = new_image.map(decode).transpose()?.flatten();
    if old_entity.is_none() && new_entity.is_none() {
        return Ok(None);
    }

    let event = record.event_kind()?;

    let (new_entity, old_entity) = match event {
        AuditEventKind::Create => (Some(require(new_entity, event, "new")?), None),
        AuditEventKind::Delete => (None, Some(require(old_entity, event, "old")?)),
        AuditEventKind::Update => (
            Some(require(new_entity, event, "new")?),
            Some(require(old_entity, event, "old")?),
        ),
    };

    if let (Some(new_entity), Some(old_entity)) = (&new_entity, &old_entity)
        && new_entity.key() != old_entity.key()
    {
        return Err(AppError::Malformed(format!(
            "images describe different entities '{}' and '{}'",
            old_entity.key(),
            new_entity.key()
        )));
    }

    let tiebreaker = match record.dynamodb.sequence_number.as_deref() {
        Some(sequence_number) => {
            if sequence_number.is_empty()
                || sequence_number.len() > SEQUENCE_NUMBER_MAX_DIGITS
                || !sequence_number.chars().all(|c| c.is_ascii_digit())
            {
                return Err(AppError::Malformed(format!(
                    "sequence number '{sequence_number}' is not a decimal of at most {SEQUENCE_NUMBER_MAX_DIGITS} digits"
                )));
            }
            Tiebreaker::SequenceNumber(sequence_number.to_owned())
        }
        None => Tiebreaker::digest(event, old_image, new_image)?,
    };

    Ok(Some(DecodedRecord {
        event,
        approximate_timestamp: record.approximate_timestamp()?,
        tiebreaker,
        new_entity,
        old_entity,
    }))
}

fn require(
    entity: Option<AuditedEntity>,
    event: AuditEventKind,
    image: &str,
) -> AppResult<AuditedEntity> {
    entity.ok_or_else(|| {
        AppError::Malformed(format!(
            "{event} record has no decodable {image} image of an audited entity"
        ))
    })
}
