//! Attach command.
//!
//! Re-drives device attachments for matching device templates, reading
//! the attachment records either from a snapshot or from the live system
//! itself.

use confsync_engine::{AttachUnit, AttachmentDriver, RunContext, Target};
use confsync_store::LocalStore;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Attaches devices to every device template whose name matches.
pub fn run(
    target: &dyn Target,
    templates: &str,
    dir: Option<&Path>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pattern = Regex::new(templates)?;
    let store = dir.map(LocalStore::new);

    let Some(index) = target.index("template_device")? else {
        println!("✓ Nothing to attach");
        return Ok(());
    };

    let mut units = Vec::new();
    for entry in &index {
        if !pattern.is_match(&entry.name) {
            continue;
        }

        let records = match &store {
            Some(store) => store
                .load_attachments("template_device", &entry.name)?
                .unwrap_or_default(),
            None => target.attached_devices(&entry.id)?,
        };

        for values in records {
            let device_id = values
                .get("uuid")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            units.push(AttachUnit {
                template_id: entry.id.clone(),
                device_id,
                values,
            });
        }
    }

    info!(units = units.len(), "attachment units collected");

    let mut ctx = if dry_run {
        RunContext::dry_run()
    } else {
        RunContext::new()
    };

    let all_ok =
        AttachmentDriver::new(target).attach(units, "attaching device templates", &mut ctx, false)?;

    println!("✓ Attach complete");
    if dry_run {
        for action in &ctx.planned {
            println!("  would {action}");
        }
    }
    if !all_ok {
        return Err("attach finished with failures".into());
    }
    Ok(())
}
