//! Per-run mutable state.

use confsync_core::IdRemapTable;

/// Aggregate counters for one orchestration run.
///
/// The run as a whole reports this tally; any failure makes the overall
/// outcome failed, whether the run aborted early or finished with some
/// item failures. The two cases are not distinguished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    /// Items created on the target.
    pub created: u64,
    /// Items updated on the target.
    pub updated: u64,
    /// Items skipped because the target already matched.
    pub skipped: u64,
    /// Items deleted from the target.
    pub deleted: u64,
    /// Per-item failures.
    pub failures: u64,
    /// Warnings (unresolvable references, read-only dependencies, ...).
    pub warnings: u64,
}

impl RunTally {
    /// Returns true if the run finished without failures.
    pub fn succeeded(&self) -> bool {
        self.failures == 0
    }
}

/// Mutable state owned by one orchestration run.
///
/// The remap table and the tally are the only state shared across the run;
/// both are created at run start and discarded at run end. Nothing here is
/// process-global.
#[derive(Debug, Default)]
pub struct RunContext {
    /// Source-id to target-id mapping built up during the run.
    pub remap: IdRemapTable,
    /// When set, mutation points record the action instead of issuing it.
    pub dry_run: bool,
    /// Aggregate outcome counters.
    pub tally: RunTally,
    /// Actions a dry run would have taken, in order.
    pub planned: Vec<String>,
}

impl RunContext {
    /// Creates the context for a mutating run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the context for a dry run.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    /// Records an action a dry run would have taken.
    pub fn record_planned(&mut self, action: impl Into<String>) {
        self.planned.push(action.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_outcome() {
        let mut tally = RunTally::default();
        assert!(tally.succeeded());

        tally.warnings = 3;
        assert!(tally.succeeded());

        tally.failures = 1;
        assert!(!tally.succeeded());
    }

    #[test]
    fn dry_run_context_records_actions() {
        let mut ctx = RunContext::dry_run();
        assert!(ctx.dry_run);

        ctx.record_planned("create site list corp-sites");
        assert_eq!(ctx.planned.len(), 1);
    }
}
