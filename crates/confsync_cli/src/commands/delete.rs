//! Delete command.

use super::compile_pattern;
use confsync_catalog::Catalog;
use confsync_engine::{DeleteOptions, PushEngine, RunContext, Target};
use tracing::warn;

/// Deletes matched items from the target, dependents first.
pub fn run(
    target: &dyn Target,
    catalog: &Catalog,
    tag: &str,
    include: Option<&str>,
    exclude: Option<&str>,
    detach: bool,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = DeleteOptions::new(tag).with_detach(detach);
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

    let engine = PushEngine::new(target, catalog);
    let report = engine.delete_matching(&options, &mut ctx)?;

    for failure in report.failures() {
        warn!(category = %failure.category, name = %failure.name, id = %failure.id,
              "delete failed; re-run with --include to retry just this item");
    }

    println!("✓ Delete complete");
    println!("  Deleted: {}", ctx.tally.deleted);
    println!("  Failures: {}", ctx.tally.failures);
    if dry_run {
        for action in &ctx.planned {
            println!("  would {action}");
        }
    }

    if !ctx.tally.succeeded() {
        return Err("delete finished with failures".into());
    }
    Ok(())
}
