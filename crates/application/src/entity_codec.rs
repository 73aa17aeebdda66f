//! Mapping between storage rows and typed entity variants.
//!
//! This is the only place that interprets the `type` discriminator and the
//! tagged attribute values; everything downstream sees typed entities.

use chronicle_core::{AppError, AppResult};
use chronicle_domain::{
    AuditedEntity, Dashboard, Dataset, EntityKey, EntityType, EntityVariant, Homepage, TopicArea,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::change_feed::{
    AttributeValue, DISCRIMINATOR_ATTRIBUTE, PARTITION_KEY_ATTRIBUTE, Row, SORT_KEY_ATTRIBUTE,
};

const ID_PROPERTY: &str = "id";

/// Decodes a row into a typed entity.
///
/// Rows whose discriminator is missing or names no audited variant decode to
/// `Ok(None)`. Top-level `NULL` attributes are treated as absent. Rows of an audited variant that cannot be decoded are
/// [`AppError::Malformed`].
pub fn decode(row: &Row) -> AppResult<Option<AuditedEntity>> {
    let Some(entity_type) = row.discriminator().and_then(EntityType::from_discriminator) else {
        return Ok(None);
    };

    let mut properties = Map::new();
    for (name, value) in row.attributes() {
        // A NULL-tagged attribute decodes like a missing one, so variant defaults apply.
        if matches!(value, AttributeValue::Null(_))
            || matches!(
                name.as_str(),
                PARTITION_KEY_ATTRIBUTE | SORT_KEY_ATTRIBUTE | DISCRIMINATOR_ATTRIBUTE
            )
        {
            continue;
        }

        properties.insert(name.clone(), attribute_to_json(value)?);
    }

    let row_key = row
        .partition_key()
        .map(EntityKey::parse)
        .transpose()
        .map_err(|error| AppError::Malformed(format!("{entity_type} row: {error}")))?;

    if let Some(row_key) = &row_key {
        if row_key.entity_type() != entity_type {
            return Err(AppError::Malformed(format!(
                "row '{row_key}' is tagged as {entity_type}"
            )));
        }

        if !properties.contains_key(ID_PROPERTY) {
            properties.insert(
                ID_PROPERTY.to_owned(),
                Value::String(row_key.id().as_str().to_owned()),
            );
        }
    }

    let entity = match entity_type {
        EntityType::Dashboard => decode_variant::<Dashboard>(properties)?,
        EntityType::Dataset => decode_variant::<Dataset>(properties)?,
        EntityType::TopicArea => decode_variant::<TopicArea>(properties)?,
        EntityType::Homepage => decode_variant::<Homepage>(properties)?,
    };

    if let Some(row_key) = row_key
        && row_key != entity.key()
    {
        return Err(AppError::Malformed(format!(
            "row '{row_key}' carries id of '{}'",
            entity.key()
        )));
    }

    Ok(Some(entity))
}

/// Encodes a typed entity into its storage row.
pub fn encode(entity: &AuditedEntity) -> AppResult<Row> {
    let key = entity.key();
    let mut row = Row::new();
    row.insert(
        PARTITION_KEY_ATTRIBUTE,
        AttributeValue::String(key.partition_key()),
    );
    row.insert(
        SORT_KEY_ATTRIBUTE,
        AttributeValue::String(key.partition_key()),
    );
    row.insert(
        DISCRIMINATOR_ATTRIBUTE,
        AttributeValue::String(entity.entity_type().as_str().to_owned()),
    );

    for (name, value) in entity.properties()? {
        row.insert(name, json_to_attribute(value));
    }

    Ok(row)
}

fn decode_variant<T>(properties: Map<String, Value>) -> AppResult<AuditedEntity>
where
    T: EntityVariant + DeserializeOwned,
{
    serde_json::from_value::<T>(Value::Object(properties))
        .map(EntityVariant::into_audited)
        .map_err(|error| {
            AppError::Malformed(format!("failed to decode {} row: {error}", T::ENTITY_TYPE))
        })
}

fn attribute_to_json(value: &AttributeValue) -> AppResult<Value> {
    Ok(match value {
        AttributeValue::String(value) => Value::String(value.clone()),
        AttributeValue::Number(value) => Value::Number(parse_number(value)?),
        AttributeValue::Bool(value) => Value::Bool(*value),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(name, value)| Ok((name.clone(), attribute_to_json(value)?)))
                .collect::<AppResult<Map<String, Value>>>()?,
        ),
        AttributeValue::List(items) => Value::Array(
            items
                .iter()
                .map(attribute_to_json)
                .collect::<AppResult<Vec<Value>>>()?,
        ),
        AttributeValue::StringSet(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::NumberSet(items) => Value::Array(
            items
                .iter()
                .map(|item| parse_number(item).map(Value::Number))
                .collect::<AppResult<Vec<Value>>>()?,
        ),
    })
}

fn parse_number(value: &str) -> AppResult<Number> {
    let trimmed = value.trim();
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Ok(Number::from(parsed));
    }

    if let Ok(parsed) = trimmed.parse::<u64>() {
        return Ok(Number::from(parsed));
    }

    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| AppError::Malformed(format!("'{value}' is not a number")))
}

fn json_to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(value) => AttributeValue::Bool(value),
        Value::Number(value) => AttributeValue::Number(value.to_string()),
        Value::String(value) => AttributeValue::String(value),
        Value::Array(items) => {
            AttributeValue::List(items.into_iter().map(json_to_attribute).collect())
        }
        Value::Object(entries) => AttributeValue::Map(
            entries
                .into_iter()
                .map(|(name, value)| (name, json_to_attribute(value)))
                .collect(),
        ),
    }
}
