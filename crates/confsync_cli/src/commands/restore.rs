//! Restore command.
//!
//! Resolves the replay plan from a snapshot and pushes it to the live
//! system; optionally reattaches device templates from the snapshot's
//! attachment records afterwards.

use super::compile_pattern;
use confsync_catalog::Catalog;
use confsync_engine::{
    AttachUnit, AttachmentDriver, DependencyResolver, PushEngine, ResolveOptions, RunContext,
    Target,
};
use confsync_store::LocalStore;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// Pushes the snapshot at `dir` to the target.
#[allow(clippy::too_many_arguments)]
pub fn run(
    target: &dyn Target,
    catalog: &Catalog,
    dir: &Path,
    tag: &str,
    include: Option<&str>,
    exclude: Option<&str>,
    update: bool,
    attach: bool,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = LocalStore::new(dir);
    let mut options = ResolveOptions::new(tag).with_force_update(update);
    if let Some(include) = compile_pattern(include)? {
        options = options.with_include(include);
    }
    if let Some(exclude) = compile_pattern(exclude)? {
        options = options.with_exclude(exclude);
    }

    let mut ctx = if dry_run {
        RunContext::dry_run()
    } else {
        RunContext::new()
    };

    let resolver = DependencyResolver::new(catalog, &store, target);
    let plan = resolver.resolve(&options, &mut ctx)?;
    info!(items = plan.item_count(), "replay plan resolved");

    let engine = PushEngine::new(target, catalog);
    let report = engine.push(&plan, &mut ctx)?;

    if attach {
        reattach_from_snapshot(target, &store, &plan, &mut ctx)?;
    }

    for failure in report.failures() {
        warn!(category = %failure.category, name = %failure.name, id = %failure.id,
              "item failed; re-run with --include to retry just this item");
    }

    println!("✓ Restore complete");
    print_tally(&ctx);
    if dry_run {
        for action in &ctx.planned {
            println!("  would {action}");
        }
    }

    if !ctx.tally.succeeded() {
        return Err("restore finished with failures".into());
    }
    Ok(())
}

/// Replays the snapshot's attachment records against the freshly pushed
/// templates, remapping template ids through the run's table.
fn reattach_from_snapshot(
    target: &dyn Target,
    store: &LocalStore,
    plan: &confsync_engine::ReplayPlan,
    ctx: &mut RunContext,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut units = Vec::new();

    for category_plan in &plan.categories {
        if category_plan.descriptor.category != "template_device" {
            continue;
        }
        for entry in &category_plan.entries {
            let Some(records) =
                store.load_attachments("template_device", &entry.item.name)?
            else {
                continue;
            };
            let Some(template_id) = ctx.remap.get(&entry.item.id).map(String::from) else {
                warn!(name = %entry.item.name, "no target id for template, attachments skipped");
                ctx.tally.warnings += 1;
                continue;
            };

            for values in records {
                let device_id = values
                    .get("uuid")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                units.push(AttachUnit {
                    template_id: template_id.clone(),
                    device_id,
                    values,
                });
            }
        }
    }

    if units.is_empty() {
        return Ok(());
    }

    AttachmentDriver::new(target).attach(units, "attaching device templates", ctx, true)?;
    Ok(())
}

fn print_tally(ctx: &RunContext) {
    println!("  Created: {}", ctx.tally.created);
    println!("  Updated: {}", ctx.tally.updated);
    println!("  Skipped: {}", ctx.tally.skipped);
    println!("  Failures: {}", ctx.tally.failures);
    println!("  Warnings: {}", ctx.tally.warnings);
}
