//! Configuration items.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload markers that identify factory-default or otherwise read-only
/// items. Such items exist on every backend out of the box and cannot be
/// recreated through the write API.
const READ_ONLY_MARKERS: &[&str] = &["factoryDefault", "readOnly"];

/// One configuration item: an id, a name, and an opaque JSON payload.
///
/// Items are owned by whichever component last loaded them and are treated
/// as immutable. Push preparation rewrites a clone of the payload, never the
/// loaded original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Backend-assigned identifier.
    pub id: String,
    /// Human-facing name, unique per category on one backend.
    pub name: String,
    /// Category the item belongs to.
    pub category: String,
    /// Opaque JSON payload.
    pub payload: Value,
    /// Whether the item is factory-default / read-only on the backend.
    pub read_only: bool,
}

impl Item {
    /// Creates an item from its parts.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        payload: Value,
    ) -> Self {
        let read_only = payload_is_read_only(&payload);
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            payload,
            read_only,
        }
    }

    /// Parses an item out of a raw backend payload.
    ///
    /// `id_field` and `name_field` name the payload keys that carry the
    /// identifier and the name for this category (they differ per item
    /// type on real backends).
    pub fn from_payload(
        category: &str,
        id_field: &str,
        name_field: &str,
        payload: Value,
    ) -> CoreResult<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| CoreError::invalid_payload("item payload must be a JSON object"))?;

        let id = obj
            .get(id_field)
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::missing_field(id_field, category))?
            .to_string();

        let name = obj
            .get(name_field)
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::missing_field(name_field, category))?
            .to_string();

        Ok(Self::new(id, name, category, payload))
    }
}

/// Returns true if the payload carries a read-only marker set to `true`.
fn payload_is_read_only(payload: &Value) -> bool {
    let Some(obj) = payload.as_object() else {
        return false;
    };

    READ_ONLY_MARKERS.iter().any(|marker| {
        obj.get(*marker)
            .map(|v| v == &Value::Bool(true) || v.as_str() == Some("true"))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_from_payload() {
        let payload = json!({
            "listId": "a1b2c3",
            "listName": "corp-prefixes",
            "entries": [{"prefix": "10.0.0.0/8"}],
        });

        let item = Item::from_payload("policy_list", "listId", "listName", payload).unwrap();
        assert_eq!(item.id, "a1b2c3");
        assert_eq!(item.name, "corp-prefixes");
        assert_eq!(item.category, "policy_list");
        assert!(!item.read_only);
    }

    #[test]
    fn missing_id_field() {
        let payload = json!({"listName": "x"});
        let err = Item::from_payload("policy_list", "listId", "listName", payload).unwrap_err();
        assert!(matches!(err, CoreError::MissingField { .. }));
    }

    #[test]
    fn factory_default_is_read_only() {
        let payload = json!({
            "templateId": "t1",
            "templateName": "Factory_Default_BGP",
            "factoryDefault": true,
        });

        let item =
            Item::from_payload("template_feature", "templateId", "templateName", payload).unwrap();
        assert!(item.read_only);
    }

    #[test]
    fn string_true_marker_is_read_only() {
        let payload = json!({"id": "x", "name": "y", "readOnly": "true"});
        let item = Item::from_payload("policy_list", "id", "name", payload).unwrap();
        assert!(item.read_only);
    }
}
