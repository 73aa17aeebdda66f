use serde_json::json;

use chronicle_core::AppError;
use chronicle_domain::AuditEventKind;

use super::{AttributeValue, ChangeBatch, ChangeRecord, FeedEventName};

#[test]
fn batch_parses_tagged_attribute_values() {
    let batch = serde_json::from_value::<ChangeBatch>(json!({
        "Records": [{
            "eventID": "e1",
            "eventName": "MODIFY",
            "dynamodb": {
                "ApproximateCreationDateTime": 1_700_000_000.5,
                "SequenceNumber": "1200",
                "NewImage": {
                    "pk": { "S": "Dashboard#d1" },
                    "version": { "N": "2" },
                    "displayTableOfContents": { "BOOL": true },
                    "releaseNotes": { "NULL": true },
                    "tableOfContents": { "M": { "a": { "L": [{ "S": "x" }] } } }
                }
            }
        }]
    }));
    assert!(batch.is_ok());
    let batch = batch.unwrap_or_default();
    let record = &batch.records[0];

    assert_eq!(record.event_name, FeedEventName::Modify);
    assert!(matches!(record.event_kind(), Ok(AuditEventKind::Update)));
    assert_eq!(record.subject_partition_key(), Some("Dashboard#d1"));
    let image = record.dynamodb.new_image.clone().unwrap_or_default();
    assert_eq!(
        image.get("version"),
        Some(&AttributeValue::Number("2".to_owned()))
    );
    assert_eq!(
        record
            .approximate_timestamp()
            .map(|timestamp| timestamp.timestamp_millis())
            .unwrap_or_default(),
        1_700_000_000_500
    );
}

#[test]
fn unknown_event_name_is_malformed() {
    let record = serde_json::from_value::<ChangeRecord>(json!({
        "eventName": "TTL_EXPIRE",
        "dynamodb": {}
    }));
    assert!(record.is_ok());
    let record = record.unwrap_or_else(|_| unreachable!());

    assert_eq!(record.event_name, FeedEventName::Unknown);
    assert!(matches!(record.event_kind(), Err(AppError::Malformed(_))));
    assert!(matches!(
        record.approximate_timestamp(),
        Err(AppError::Malformed(_))
    ));
}

#[test]
fn subject_falls_back_to_old_image() {
    let record = serde_json::from_value::<ChangeRecord>(json!({
        "eventName": "REMOVE",
        "dynamodb": {
            "ApproximateCreationDateTime": 10,
            "OldImage": { "pk": { "S": "TopicArea#t1" } }
        }
    }));
    assert!(record.is_ok());

    assert_eq!(
        record
            .unwrap_or_else(|_| unreachable!())
            .subject_partition_key(),
        Some("TopicArea#t1")
    );
}
