//! The identifier remap table.

use std::collections::BTreeMap;
use tracing::warn;

/// Append-only `old_id -> new_id` mapping, scoped to one orchestration run.
///
/// Once an id is mapped it is never remapped to a different value; a
/// conflicting insert keeps the first mapping and logs a warning. Iteration
/// order is deterministic so substitution passes are reproducible.
#[derive(Debug, Clone, Default)]
pub struct IdRemapTable {
    entries: BTreeMap<String, String>,
}

impl IdRemapTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a mapping. The first mapping for an id wins.
    ///
    /// Returns true if the mapping was recorded, false if an entry for
    /// `old_id` already existed (a conflicting value is logged).
    pub fn insert(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) -> bool {
        let old_id = old_id.into();
        let new_id = new_id.into();

        match self.entries.get(&old_id) {
            None => {
                self.entries.insert(old_id, new_id);
                true
            }
            Some(existing) if *existing == new_id => false,
            Some(existing) => {
                warn!(
                    old_id = %old_id,
                    kept = %existing,
                    rejected = %new_id,
                    "conflicting id remap ignored"
                );
                false
            }
        }
    }

    /// Looks up the mapped id.
    pub fn get(&self, old_id: &str) -> Option<&str> {
        self.entries.get(old_id).map(String::as_str)
    }

    /// Returns true if `old_id` has a mapping.
    pub fn contains(&self, old_id: &str) -> bool {
        self.entries.contains_key(old_id)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(old_id, new_id)` pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
