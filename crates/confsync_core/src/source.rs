//! The read seam over configuration backends.

use crate::error::CoreResult;
use crate::index::Index;
use crate::item::Item;

/// A source of configuration items: either a local snapshot or the live
/// system.
///
/// Implementations return `Ok(None)` when an index or item simply does not
/// exist on the backend; errors are reserved for I/O and transport
/// failures.
pub trait ConfigSource: Send + Sync {
    /// Loads the id/name index for one category, if present.
    fn load_index(&self, category: &str) -> CoreResult<Option<Index>>;

    /// Loads one item by id and name, if present.
    ///
    /// Both the id and the name are supplied because backends differ in
    /// which of the two addresses an item (live systems key by id, snapshot
    /// directories key by name).
    fn load_item(&self, category: &str, id: &str, name: &str) -> CoreResult<Option<Item>>;
}
