use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use chronicle_application::{AppendOutcome, AuditLogRepository};
use chronicle_core::NonEmptyString;
use chronicle_domain::{
    AuditEventKind, AuditLogEntry, AuditLogEntryInput, EntityKey, EntityType, HistoryLabel,
    OrderingKey, PropertyChange,
};

use super::{AuditTableName, PostgresAuditLogRepository};

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    Some(pool)
}

async fn test_repository() -> Option<PostgresAuditLogRepository> {
    let pool = test_pool().await?;
    let repository = PostgresAuditLogRepository::new(
        pool,
        AuditTableName::new("audit_log_entries_test").unwrap_or_default(),
    );

    if let Err(error) = repository.ensure_schema().await {
        panic!("failed to prepare audit table for postgres audit log tests: {error}");
    }

    Some(repository)
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

static SUBJECT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_subject() -> EntityKey {
    let id = format!(
        "pg-{}-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        SUBJECT_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    EntityKey::new(
        EntityType::Dashboard,
        NonEmptyString::new(id).unwrap_or_else(|_| unreachable!()),
    )
}

fn entry(
    subject: &EntityKey,
    event: AuditEventKind,
    seconds: i64,
    sequence: &str,
    modified_properties: Vec<PropertyChange>,
) -> AuditLogEntry {
    AuditLogEntry::new(AuditLogEntryInput {
        subject: subject.clone(),
        event,
        ordering_key: OrderingKey::from_sequence_number(at(seconds), sequence)
            .unwrap_or_else(|_| unreachable!()),
        timestamp: at(seconds + 1),
        actor: Some("alice".to_owned()),
        modified_properties,
    })
    .unwrap_or_else(|_| unreachable!())
}

#[test]
fn table_name_must_be_a_plain_identifier() {
    assert!(AuditTableName::new("audit_log_entries").is_ok());
    assert!(AuditTableName::new("_audit2").is_ok());
    assert!(AuditTableName::new("audit; DROP TABLE x").is_err());
    assert!(AuditTableName::new("2audit").is_err());
    assert!(AuditTableName::new("AuditLog").is_err());
    assert!(AuditTableName::new("").is_err());
}

#[tokio::test]
async fn append_is_idempotent_and_history_is_most_recent_first() {
    let Some(repository) = test_repository().await else {
        return;
    };
    let subject = unique_subject();

    let created = entry(&subject, AuditEventKind::Create, 100, "1", Vec::new());
    let submitted = entry(
        &subject,
        AuditEventKind::Update,
        200,
        "2",
        vec![PropertyChange::new(
            "state",
            json!("Draft"),
            json!("PublishPending"),
        )],
    );

    let first = repository.append(created.clone()).await;
    assert!(matches!(first, Ok(AppendOutcome::Inserted)));
    let second = repository.append(submitted.clone()).await;
    assert!(matches!(second, Ok(AppendOutcome::Inserted)));
    let redelivered = repository.append(created.clone()).await;
    assert!(matches!(redelivered, Ok(AppendOutcome::AlreadyPresent)));

    let history = repository
        .list_history(subject.partition_key().as_str())
        .await;
    assert!(history.is_ok());
    let history = history.unwrap_or_default();
    assert_eq!(history, vec![submitted, created]);
    assert_eq!(history[0].label(), HistoryLabel::MovedToPublishQueue);
}

#[tokio::test]
async fn history_never_includes_other_subjects() {
    let Some(repository) = test_repository().await else {
        return;
    };
    let left = unique_subject();
    let right = unique_subject();

    let appended_left = repository
        .append(entry(&left, AuditEventKind::Create, 100, "1", Vec::new()))
        .await;
    assert!(appended_left.is_ok());
    let appended_right = repository
        .append(entry(&right, AuditEventKind::Create, 100, "1", Vec::new()))
        .await;
    assert!(appended_right.is_ok());

    let history = repository
        .list_history(left.partition_key().as_str())
        .await
        .unwrap_or_default();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].subject_id().as_str(), left.partition_key());
}
