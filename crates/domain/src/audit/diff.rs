use chronicle_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::AuditedEntity;

/// Properties rewritten on every write; never reported as changes.
pub const BOOKKEEPING_PROPERTIES: &[&str] = &["createdAt", "updatedAt"];

/// One property-level difference between two entity versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChange {
    property: String,
    old_value: Value,
    new_value: Value,
}

impl PropertyChange {
    /// Creates a property change.
    #[must_use]
    pub fn new(property: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            property: property.into(),
            old_value,
            new_value,
        }
    }

    /// Returns the property name as stored.
    #[must_use]
    pub fn property(&self) -> &str {
        self.property.as_str()
    }

    /// Returns the value before the mutation; `null` when absent.
    #[must_use]
    pub fn old_value(&self) -> &Value {
        &self.old_value
    }

    /// Returns the value after the mutation; `null` when absent.
    #[must_use]
    pub fn new_value(&self) -> &Value {
        &self.new_value
    }
}

/// Computes the property changes between two versions of the same entity.
///
/// Both versions must share variant and identity.
pub fn diff(old: &AuditedEntity, new: &AuditedEntity) -> AppResult<Vec<PropertyChange>> {
    let (old_key, new_key) = (old.key(), new.key());
    if old_key != new_key {
        return Err(AppError::Contract(format!(
            "cannot diff '{old_key}' against '{new_key}'"
        )));
    }

    Ok(diff_properties(&old.properties()?, &new.properties()?))
}

/// Compares two property maps by deep value equality.
///
/// Changes follow the new version's property order, then properties that only
/// the old version carried. A missing property compares equal to `null`.
#[must_use]
pub fn diff_properties(old: &Map<String, Value>, new: &Map<String, Value>) -> Vec<PropertyChange> {
    let mut changes = Vec::new();

    for (property, new_value) in new {
        if BOOKKEEPING_PROPERTIES.contains(&property.as_str()) {
            continue;
        }

        let old_value = old.get(property).unwrap_or(&Value::Null);
        if old_value != new_value {
            changes.push(PropertyChange::new(
                property.as_str(),
                old_value.clone(),
                new_value.clone(),
            ));
        }
    }

    for (property, old_value) in old {
        if new.contains_key(property)
            || old_value.is_null()
            || BOOKKEEPING_PROPERTIES.contains(&property.as_str())
        {
            continue;
        }

        changes.push(PropertyChange::new(
            property.as_str(),
            old_value.clone(),
            Value::Null,
        ));
    }

    changes
}
