//! Payload scanning and rewriting utilities.
//!
//! Configuration payloads are opaque JSON: the engine never interprets
//! item-type-specific structure. Cross-item references are found by scanning
//! the serialized payload text for identifier-shaped tokens, and rewritten
//! the same way. Administrative fields the backend stamps onto items are
//! stripped before payloads are compared for semantic equality.

use crate::item::Item;
use crate::remap::IdRemapTable;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Administrative fields excluded from semantic comparison. The backend
/// stamps these on every write, so they differ between backends even for
/// items with identical configuration content.
const VOLATILE_FIELDS: &[&str] = &[
    "@rid",
    "createdBy",
    "createdOn",
    "lastUpdatedBy",
    "lastUpdatedOn",
    "owner",
    "infoTag",
    "devicesAttached",
    "attachedMastersCount",
];

/// Matches an identifier-shaped token (UUID form) anywhere in text.
fn id_token() -> &'static Regex {
    static ID_TOKEN: OnceLock<Regex> = OnceLock::new();
    ID_TOKEN.get_or_init(|| {
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
            .unwrap()
    })
}

/// Returns the set of identifier tokens found inside an item's payload,
/// excluding the item's own id.
///
/// This is the item's reference set: every other item it depends on appears
/// here by id. Tokens that do not correspond to a real item are harmless;
/// they simply never resolve during substitution.
pub fn reference_set(item: &Item) -> BTreeSet<String> {
    let serialized = item.payload.to_string();

    id_token()
        .find_iter(&serialized)
        .map(|m| m.as_str().to_string())
        .filter(|token| *token != item.id)
        .collect()
}

/// Rewrites every mapped identifier token in a payload using the remap
/// table snapshot passed in. Tokens with no mapping pass through unchanged.
///
/// Returns a new payload; the input is never mutated.
pub fn substitute_ids(payload: &Value, remap: &IdRemapTable) -> Value {
    if remap.is_empty() {
        return payload.clone();
    }

    let serialized = payload.to_string();
    let rewritten = id_token().replace_all(&serialized, |caps: &regex::Captures<'_>| {
        let token = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        remap.get(token).unwrap_or(token).to_string()
    });

    // Tokens only ever sit inside JSON strings and are swapped for other
    // tokens of the same shape; a parse failure would mean the payload was
    // not valid JSON to begin with.
    serde_json::from_str(&rewritten).unwrap_or_else(|_| payload.clone())
}

/// Strips volatile/administrative fields from a payload, recursively.
pub fn strip_volatile(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !VOLATILE_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), strip_volatile(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_volatile).collect()),
        other => other.clone(),
    }
}

/// Structural equality of two payloads, ignoring volatile fields and the
/// given id fields.
///
/// Used to decide whether an update against an existing target item would
/// be a no-op. The id fields are excluded because the two backends assign
/// different identifiers to the same logical item.
pub fn semantically_equal(a: &Value, b: &Value, id_fields: &[&str]) -> bool {
    strip_fields(&strip_volatile(a), id_fields) == strip_fields(&strip_volatile(b), id_fields)
}

fn strip_fields(payload: &Value, fields: &[&str]) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !fields.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), strip_fields(value, fields)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| strip_fields(v, fields)).collect())
        }
        other => other.clone(),
    }
}
