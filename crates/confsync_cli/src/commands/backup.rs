//! Backup command.
//!
//! Walks the catalog in dependency order, saving each category's index,
//! items and (for device templates) attachment records into a local
//! snapshot directory.

use super::compile_pattern;
use confsync_catalog::Catalog;
use confsync_engine::Target;
use confsync_store::LocalStore;
use std::path::Path;
use tracing::{info, warn};

/// Saves matching items of `tag` into a snapshot at `dir`.
pub fn run(
    target: &dyn Target,
    catalog: &Catalog,
    dir: &Path,
    tag: &str,
    include: Option<&str>,
    exclude: Option<&str>,
    extended_naming: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let include = compile_pattern(include)?;
    let exclude = compile_pattern(exclude)?;
    let store = LocalStore::new(dir).with_extended_naming(extended_naming);

    let mut saved = 0u64;
    let mut failures = 0u64;

    for descriptor in catalog.ordered(tag, false)? {
        let Some(index) = target.index(descriptor.category)? else {
            continue;
        };

        let mut kept = confsync_core::Index::new();
        for entry in &index {
            if let Some(include) = &include {
                if !include.is_match(&entry.name) {
                    continue;
                }
            }
            if let Some(exclude) = &exclude {
                if exclude.is_match(&entry.name) {
                    continue;
                }
            }

            match target.item(descriptor.category, &entry.id, &entry.name) {
                Ok(Some(item)) => {
                    store.save_item(&item)?;
                    kept.push(entry.id.clone(), entry.name.clone());
                    saved += 1;
                }
                Ok(None) => {
                    warn!(category = descriptor.category, name = %entry.name,
                          "indexed item missing on target");
                }
                Err(e) => {
                    warn!(category = descriptor.category, name = %entry.name, error = %e,
                          "item fetch failed");
                    failures += 1;
                    continue;
                }
            }

            if descriptor.category == "template_device" {
                match target.attached_devices(&entry.id) {
                    Ok(devices) if !devices.is_empty() => {
                        store.save_attachments(descriptor.category, &entry.name, &devices)?;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(name = %entry.name, error = %e, "attachment listing failed");
                        failures += 1;
                    }
                }
            }
        }

        if !kept.is_empty() {
            store.save_index(descriptor.category, &kept)?;
        }
    }

    info!(saved, failures, "backup finished");
    println!("✓ Backup complete");
    println!("  Path: {:?}", dir);
    println!("  Items saved: {saved}");
    if failures > 0 {
        println!("  Failures: {failures}");
        return Err("backup finished with failures".into());
    }
    Ok(())
}
