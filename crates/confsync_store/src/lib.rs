//! # confsync Store
//!
//! Local snapshot store: a directory tree of JSON files holding the
//! indexes, items and attachment records of one backup.
//!
//! Layout, per category:
//!
//! ```text
//! <root>/<category>/index.json
//! <root>/<category>/items/<name>.json
//! <root>/<category>/attachments/<name>.json
//! ```
//!
//! Item files are keyed by sanitized item name; an extended-naming mode
//! appends the item id for backends that allow names unsafe or ambiguous
//! as file names. A missing index or item reads as absent, never as an
//! error.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod local;

pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
