//! # confsync Core
//!
//! Data model for the confsync configuration synchronization toolkit.
//!
//! This crate provides:
//! - Configuration items with opaque JSON payloads
//! - Per-category id/name indexes
//! - Identifier reference scanning and substitution
//! - The append-only identifier remap table
//! - The `ConfigSource` read seam consumed by the orchestration engine
//!
//! ## Key Invariants
//!
//! - Loaded items are never mutated; push preparation rewrites a clone
//! - A remapped identifier is never remapped again to a different value
//! - Reference scanning is purely textual: any identifier-shaped token in
//!   the serialized payload counts, except the item's own id

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod item;
pub mod payload;
mod remap;
mod source;

pub use error::{CoreError, CoreResult};
pub use index::{Index, IndexEntry};
pub use item::Item;
pub use remap::IdRemapTable;
pub use source::ConfigSource;
