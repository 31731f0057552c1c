//! Per-category id/name indexes.

use serde::{Deserialize, Serialize};

/// One entry of a category index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Backend-assigned identifier.
    pub id: String,
    /// Item name.
    pub name: String,
}

/// Ordered `id -> name` mapping for all items of one category on one
/// backend.
///
/// The entry order is the backend's enumeration order and is preserved so
/// that a run is deterministic given the same input. Within one backend and
/// category, names are unique among restorable entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates an index from `(id, name)` pairs, preserving order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(id, name)| IndexEntry {
                    id: id.into(),
                    name: name.into(),
                })
                .collect(),
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.entries.push(IndexEntry {
            id: id.into(),
            name: name.into(),
        });
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in backend order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Looks up the name for an id.
    pub fn name_for_id(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.as_str())
    }

    /// Looks up the id for a name.
    ///
    /// Name lookup is the reconciliation primitive between backends: ids
    /// differ per backend, names are expected to match. If a backend holds
    /// duplicate names the first entry wins.
    pub fn id_for_name(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.id.as_str())
    }

    /// Returns true if an item of this name exists.
    pub fn contains_name(&self, name: &str) -> bool {
        self.id_for_name(name).is_some()
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a IndexEntry;
    type IntoIter = std::slice::Iter<'a, IndexEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
