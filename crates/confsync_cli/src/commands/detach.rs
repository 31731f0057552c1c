//! Detach command.

use confsync_engine::{AttachmentDriver, RunContext, Target};
use regex::Regex;
use serde_json::Value;
use tracing::info;

/// Detaches all devices from every device template whose name matches.
pub fn run(
    target: &dyn Target,
    templates: &str,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pattern = Regex::new(templates)?;

    let Some(index) = target.index("template_device")? else {
        println!("✓ Nothing to detach");
        return Ok(());
    };

    let mut ctx = if dry_run {
        RunContext::dry_run()
    } else {
        RunContext::new()
    };

    let driver = AttachmentDriver::new(target);
    let mut all_ok = true;

    for entry in &index {
        if !pattern.is_match(&entry.name) {
            continue;
        }

        let device_ids: Vec<String> = target
            .attached_devices(&entry.id)?
            .iter()
            .filter_map(|d| d.get("uuid").and_then(Value::as_str))
            .map(String::from)
            .collect();
        if device_ids.is_empty() {
            continue;
        }

        info!(template = %entry.name, devices = device_ids.len(), "detaching");
        all_ok &= driver.detach(
            &entry.id,
            device_ids,
            "detaching device templates",
            &mut ctx,
            false,
        )?;
    }

    println!("✓ Detach complete");
    if dry_run {
        for action in &ctx.planned {
            println!("  would {action}");
        }
    }
    if !all_ok {
        return Err("detach finished with failures".into());
    }
    Ok(())
}
