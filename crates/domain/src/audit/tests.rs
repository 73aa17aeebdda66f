use chrono::{DateTime, TimeZone, Utc};
use chronicle_core::{AppError, NonEmptyString};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

use super::{
    AuditEventKind, AuditLogEntry, AuditLogEntryInput, HistoryLabel, OrderingKey, PropertyChange,
    diff, diff_properties,
};
use crate::{
    AuditedEntity, Dashboard, DashboardState, Dataset, EntityKey, EntityType, EntityVariant,
    TopicArea,
};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

fn dashboard() -> Dashboard {
    Dashboard::new("d1", "Covid cases", "alice")
        .unwrap_or_else(|_| unreachable!())
        .with_description("Weekly counts")
}

fn state_change(from: &str, to: &str) -> PropertyChange {
    PropertyChange::new("state", json!(from), json!(to))
}

#[test]
fn identical_versions_produce_no_changes() {
    let old = dashboard().into_audited();
    let new = dashboard().into_audited();

    let changes = diff(&old, &new);
    assert!(changes.is_ok());
    assert!(changes.unwrap_or_default().is_empty());
}

#[test]
fn bookkeeping_timestamp_is_not_a_change() {
    let old = dashboard().with_update("alice", at(100)).into_audited();
    let new = dashboard().with_update("alice", at(200)).into_audited();

    let changes = diff(&old, &new).unwrap_or_default();
    assert!(changes.is_empty());
}

#[test]
fn single_property_change_reports_old_and_new_values() {
    let old = dashboard().into_audited();
    let new = dashboard().with_description("Daily counts").into_audited();

    let changes = diff(&old, &new).unwrap_or_default();
    assert_eq!(
        changes,
        vec![PropertyChange::new(
            "description",
            json!("Weekly counts"),
            json!("Daily counts")
        )]
    );
}

#[test]
fn optional_property_appearing_is_reported_against_null() {
    let old = dashboard().into_audited();
    let new = dashboard().with_topic_area("t1", "Health").into_audited();

    let changes = diff(&old, &new).unwrap_or_default();
    let properties: Vec<&str> = changes.iter().map(PropertyChange::property).collect();
    assert_eq!(properties, vec!["topicAreaId", "topicAreaName"]);
    assert_eq!(changes[0].old_value(), &Value::Null);
}

#[test]
fn optional_property_disappearing_is_reported() {
    let mut old = Map::new();
    old.insert("summary".to_owned(), json!("Quarterly"));
    old.insert("name".to_owned(), json!("Claims"));
    let mut new = Map::new();
    new.insert("name".to_owned(), json!("Claims"));

    let changes = diff_properties(&old, &new);
    assert_eq!(
        changes,
        vec![PropertyChange::new("summary", json!("Quarterly"), Value::Null)]
    );
}

#[test]
fn nested_values_compare_structurally() {
    let mut old = Map::new();
    old.insert("s3Key".to_owned(), json!({ "raw": "a.csv", "json": "a.json" }));
    let mut same = Map::new();
    same.insert("s3Key".to_owned(), json!({ "raw": "a.csv", "json": "a.json" }));
    let mut changed = Map::new();
    changed.insert("s3Key".to_owned(), json!({ "raw": "b.csv", "json": "a.json" }));

    assert!(diff_properties(&old, &same).is_empty());
    assert_eq!(diff_properties(&old, &changed).len(), 1);
}

#[test]
fn diff_rejects_different_subjects() {
    let dashboard = dashboard().into_audited();
    let topic_area = TopicArea::new("d1", "Health", "alice")
        .unwrap_or_else(|_| unreachable!())
        .into_audited();
    let other_dashboard = Dashboard::new("d2", "Covid cases", "alice")
        .unwrap_or_else(|_| unreachable!())
        .into_audited();

    assert!(matches!(
        diff(&dashboard, &topic_area),
        Err(AppError::Contract(_))
    ));
    assert!(matches!(
        diff(&dashboard, &other_dashboard),
        Err(AppError::Contract(_))
    ));
}

#[test]
fn label_precedence_follows_event_kind_first() {
    let changes = vec![state_change("Draft", "Published")];
    assert_eq!(
        HistoryLabel::derive(AuditEventKind::Create, &[]),
        HistoryLabel::Created
    );
    assert_eq!(
        HistoryLabel::derive(AuditEventKind::Delete, &[]),
        HistoryLabel::Deleted
    );
    assert_eq!(
        HistoryLabel::derive(AuditEventKind::Create, &changes),
        HistoryLabel::Created
    );
}

#[test]
fn update_labels_follow_target_state() {
    let cases = [
        ("Draft", "PublishPending", "Moved to publish queue"),
        ("PublishPending", "Published", "Published"),
        ("Published", "Archived", "Archived"),
        ("PublishPending", "Draft", "Returned to draft"),
        ("Published", "Inactive", "Marked inactive"),
    ];

    for (from, to, expected) in cases {
        let label = HistoryLabel::derive(AuditEventKind::Update, &[state_change(from, to)]);
        assert_eq!(label.as_str(), expected);
    }
}

#[test]
fn update_without_state_change_is_edited() {
    let description = PropertyChange::new("description", json!("a"), json!("b"));
    assert_eq!(
        HistoryLabel::derive(AuditEventKind::Update, &[description]),
        HistoryLabel::Edited
    );
    assert_eq!(
        HistoryLabel::derive(AuditEventKind::Update, &[]),
        HistoryLabel::Edited
    );
}

#[test]
fn last_state_change_wins_and_unknown_states_are_skipped() {
    let changes = vec![
        state_change("Draft", "PublishPending"),
        PropertyChange::new("description", json!("a"), json!("b")),
        state_change("PublishPending", "Published"),
        state_change("Published", "Exploded"),
    ];

    assert_eq!(
        HistoryLabel::derive(AuditEventKind::Update, &changes),
        HistoryLabel::Published
    );
}

#[test]
fn ordering_key_sort_key_orders_chronologically() {
    let earlier = OrderingKey::from_sequence_number(at(9), "900");
    let later = OrderingKey::from_sequence_number(at(10), "100");
    let same_time_later_sequence = OrderingKey::from_sequence_number(at(10), "1000");
    assert!(earlier.is_ok() && later.is_ok() && same_time_later_sequence.is_ok());
    let earlier = earlier.unwrap_or_else(|_| unreachable!());
    let later = later.unwrap_or_else(|_| unreachable!());
    let same_time_later_sequence = same_time_later_sequence.unwrap_or_else(|_| unreachable!());

    assert!(earlier < later);
    assert!(earlier.sort_key() < later.sort_key());
    assert!(later < same_time_later_sequence);
    assert!(later.sort_key() < same_time_later_sequence.sort_key());
}

#[test]
fn ordering_key_parses_its_sort_key() {
    let key = OrderingKey::from_sequence_number(at(1_700_000_000), "42")
        .unwrap_or_else(|_| unreachable!());
    let parsed = OrderingKey::parse(key.sort_key().as_str());
    assert!(parsed.is_ok());
    assert_eq!(parsed.unwrap_or_else(|_| unreachable!()), key);
}

#[test]
fn ordering_key_rejects_invalid_tiebreakers() {
    assert!(OrderingKey::new(at(1), "").is_err());
    assert!(OrderingKey::new(at(1), "a#b").is_err());
    assert!(OrderingKey::from_sequence_number(at(1), "12a").is_err());
    assert!(OrderingKey::new(at(-1), "1").is_err());
}

#[test]
fn create_entry_rejects_modified_properties() {
    let subject = EntityKey::new(
        EntityType::Dataset,
        NonEmptyString::new("ds1").unwrap_or_else(|_| unreachable!()),
    );
    let entry = AuditLogEntry::new(AuditLogEntryInput {
        subject,
        event: AuditEventKind::Create,
        ordering_key: OrderingKey::new(at(5), "1").unwrap_or_else(|_| unreachable!()),
        timestamp: at(5),
        actor: Some("bob".to_owned()),
        modified_properties: vec![PropertyChange::new("name", json!("a"), json!("b"))],
    });

    assert!(matches!(entry, Err(AppError::Contract(_))));
}

#[test]
fn entry_id_is_deterministic_per_subject_and_ordering_key() {
    let build = |actor: &str| {
        AuditLogEntry::new(AuditLogEntryInput {
            subject: Dataset::new("ds1", "Claims", "bob")
                .unwrap_or_else(|_| unreachable!())
                .into_audited()
                .key(),
            event: AuditEventKind::Update,
            ordering_key: OrderingKey::new(at(5), "7").unwrap_or_else(|_| unreachable!()),
            timestamp: at(6),
            actor: Some(actor.to_owned()),
            modified_properties: vec![state_change("Draft", "PublishPending")],
        })
        .unwrap_or_else(|_| unreachable!())
    };

    let first = build("bob");
    let second = build("carol");
    assert_eq!(first.entry_id(), second.entry_id());
    assert_eq!(first.subject_id().as_str(), "Dataset#ds1");
    assert_eq!(first.label(), HistoryLabel::MovedToPublishQueue);
    assert_eq!(first.timestamp(), at(6));
    assert_eq!(first.ordering_key().timestamp(), at(5));
}

#[test]
fn entry_timestamp_is_truncated_to_milliseconds() {
    let written_at = at(5) + chrono::Duration::microseconds(1_234_567);
    let entry = AuditLogEntry::new(AuditLogEntryInput {
        subject: EntityKey::new(
            EntityType::Dataset,
            NonEmptyString::new("ds1").unwrap_or_else(|_| unreachable!()),
        ),
        event: AuditEventKind::Create,
        ordering_key: OrderingKey::new(at(5), "1").unwrap_or_else(|_| unreachable!()),
        timestamp: written_at,
        actor: None,
        modified_properties: Vec::new(),
    })
    .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        entry.timestamp(),
        at(6) + chrono::Duration::milliseconds(234)
    );
}

fn arb_state() -> impl Strategy<Value = DashboardState> {
    prop_oneof![
        Just(DashboardState::Draft),
        Just(DashboardState::PublishPending),
        Just(DashboardState::Published),
        Just(DashboardState::Archived),
        Just(DashboardState::Inactive),
    ]
}

fn arb_dashboard() -> impl Strategy<Value = AuditedEntity> {
    ("[a-z ]{0,12}", arb_state(), 0_i64..2_000_000_000).prop_map(
        |(description, state, updated)| {
            dashboard()
                .with_description(description)
                .with_state(state)
                .with_update("alice", at(updated))
                .into_audited()
        },
    )
}

proptest! {
    #[test]
    fn diff_of_equal_properties_is_empty(entity in arb_dashboard()) {
        let changes = diff(&entity, &entity.clone());
        prop_assert!(changes.is_ok());
        prop_assert!(changes.unwrap_or_default().is_empty());
    }

    #[test]
    fn diff_is_empty_exactly_when_compared_properties_match(
        left in arb_dashboard(),
        right in arb_dashboard(),
    ) {
        let changes = diff(&left, &right).unwrap_or_default();
        let same = match (&left, &right) {
            (AuditedEntity::Dashboard(left), AuditedEntity::Dashboard(right)) => {
                left.description() == right.description() && left.state() == right.state()
            }
            _ => false,
        };
        prop_assert_eq!(changes.is_empty(), same);
        prop_assert!(changes.iter().all(|change| change.property() != "updatedAt"));
    }
}
