//! # confsync Catalog
//!
//! Static registry of configuration item types and their dependency order.
//!
//! This crate provides:
//! - Category descriptors (tag, REST paths, id/name field names)
//! - The fixed cross-category dependency ordering
//! - Construction-time REST path selection for split-endpoint categories
//!
//! ## Key Invariants
//!
//! - The registry is built once by an initialization function and owned by
//!   the caller; there is no module-level mutable state
//! - Registration order reproduces the documented dependency order
//!   deterministically
//! - Descriptors are enumerated most-dependent first (deletion order);
//!   reversing yields creation order

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod descriptor;
mod registry;

pub use descriptor::{ApiPaths, CategoryDescriptor, PathSet};
pub use registry::{Catalog, CatalogError, CatalogResult, WILDCARD_TAG};
