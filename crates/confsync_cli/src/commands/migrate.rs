//! Migrate command.
//!
//! Copies a snapshot into a new one, renaming items through a name
//! template and dropping categories the destination backend version does
//! not support. Payloads are copied verbatim; rewriting payload internals
//! for a new version is a separate concern outside this tool.

use confsync_catalog::Catalog;
use confsync_core::{ConfigSource, Index, Item};
use confsync_store::LocalStore;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// Copies the snapshot at `dir` into `out`.
pub fn run(
    catalog: &Catalog,
    dir: &Path,
    out: &Path,
    name_template: &str,
    to_version: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = LocalStore::new(dir);
    let destination = LocalStore::new(out);

    let mut migrated = 0u64;
    let mut dropped = 0u64;

    for category in source.categories()? {
        let Some(descriptor) = catalog.descriptor(&category) else {
            warn!(category, "unknown category in snapshot, skipped");
            dropped += 1;
            continue;
        };

        if let Some(to_version) = to_version {
            if !descriptor.supported_on(to_version) {
                info!(category, to_version, "category not supported on target version");
                dropped += 1;
                continue;
            }
        }

        let Some(index) = source.load_index(&category)? else {
            continue;
        };

        let mut renamed_index = Index::new();
        for entry in &index {
            let Some(item) = source.load_item(&category, &entry.id, &entry.name)? else {
                warn!(category, name = %entry.name, "indexed item missing from snapshot");
                continue;
            };

            let new_name = name_template.replace("{name}", &item.name);
            // The payload's own name field has to follow the rename, or a
            // later restore would resolve one name and push another.
            let mut payload = item.payload.clone();
            if let Some(obj) = payload.as_object_mut() {
                obj.insert(
                    descriptor.name_field.to_string(),
                    Value::String(new_name.clone()),
                );
            }
            let migrated_item = Item::new(
                item.id.clone(),
                new_name.clone(),
                item.category.clone(),
                payload,
            );

            destination.save_item(&migrated_item)?;
            if let Some(records) = source.load_attachments(&category, &item.name)? {
                destination.save_attachments(&category, &new_name, &records)?;
            }

            renamed_index.push(item.id.clone(), new_name);
            migrated += 1;
        }

        if !renamed_index.is_empty() {
            destination.save_index(&category, &renamed_index)?;
        }
    }

    println!("✓ Migration complete");
    println!("  Path: {:?}", out);
    println!("  Items migrated: {migrated}");
    if dropped > 0 {
        println!("  Categories dropped: {dropped}");
    }
    Ok(())
}
