//! Dependency resolution.
//!
//! Given a requested category tag and optional name filters, the resolver
//! walks the catalog's dependency order, loads both backends' indexes, and
//! produces the closed, ordered set of items one run must process: the
//! explicitly matched items plus everything they transitively reference.
//!
//! The plan is ordered most-dependent category first (safe deletion
//! order); the push engine iterates it reversed so that leaf categories
//! are created before their dependents. Walking dependents first is what
//! makes closure computation a single pass: by the time a leaf category is
//! enumerated, every id that the already-visited dependents reference is
//! known.

use crate::error::EngineResult;
use crate::run::RunContext;
use crate::target::Target;
use confsync_catalog::{Catalog, CategoryDescriptor, WILDCARD_TAG};
use confsync_core::{payload, ConfigSource, Index, Item};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, error, warn};

/// What to resolve.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Requested category tag, or the wildcard.
    pub tag: String,
    /// Only names matching this pattern are explicit matches.
    pub include: Option<Regex>,
    /// Names matching this pattern are never explicit matches.
    pub exclude: Option<Regex>,
    /// Include items that already exist on the target, so the push engine
    /// can update them in place.
    pub force_update: bool,
}

impl ResolveOptions {
    /// Resolves everything under `tag` with no name filters.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            include: None,
            exclude: None,
            force_update: false,
        }
    }

    /// Sets the include pattern.
    pub fn with_include(mut self, include: Regex) -> Self {
        self.include = Some(include);
        self
    }

    /// Sets the exclude pattern.
    pub fn with_exclude(mut self, exclude: Regex) -> Self {
        self.exclude = Some(exclude);
        self
    }

    /// Enables force-update mode.
    pub fn with_force_update(mut self, force_update: bool) -> Self {
        self.force_update = force_update;
        self
    }

    fn name_matches(&self, name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(name) {
                return false;
            }
        }
        true
    }
}

/// The closed set of item ids a run will process.
#[derive(Debug, Clone, Default)]
pub struct DependencyClosure {
    /// Ids explicitly selected by tag and name filters.
    pub matched: BTreeSet<String>,
    /// Ids pulled in transitively through payload references.
    pub dependencies: BTreeSet<String>,
}

impl DependencyClosure {
    /// Returns true if `id` is in the closure.
    pub fn contains(&self, id: &str) -> bool {
        self.matched.contains(id) || self.dependencies.contains(id)
    }
}

/// One item scheduled for processing.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// The source-side item.
    pub item: Item,
    /// Existing target counterpart id, when one was found by name.
    pub target_id: Option<String>,
    /// True when selected by the filters, false when pulled in as a
    /// dependency only. Dependency-only items are pushed but never deleted
    /// standalone.
    pub matched: bool,
}

/// All scheduled items of one category.
#[derive(Debug, Clone)]
pub struct CategoryPlan {
    /// The category's descriptor.
    pub descriptor: CategoryDescriptor,
    /// Target-side index observed at resolve time.
    pub target_index: Index,
    /// Items in source enumeration order.
    pub entries: Vec<PlanEntry>,
}

/// The resolver's output: category plans in deletion order plus the
/// dependency closure.
#[derive(Debug, Clone, Default)]
pub struct ReplayPlan {
    /// Category plans, most-dependent category first.
    pub categories: Vec<CategoryPlan>,
    /// The closed id set.
    pub closure: DependencyClosure,
}

impl ReplayPlan {
    /// Total number of scheduled items.
    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.entries.len()).sum()
    }
}

/// Computes the replay plan for one run.
pub struct DependencyResolver<'a, T: Target + ?Sized> {
    catalog: &'a Catalog,
    source: &'a dyn ConfigSource,
    target: &'a T,
}

impl<'a, T: Target + ?Sized> DependencyResolver<'a, T> {
    /// Creates a resolver reading from `source` and reconciling against
    /// `target`.
    pub fn new(catalog: &'a Catalog, source: &'a dyn ConfigSource, target: &'a T) -> Self {
        Self {
            catalog,
            source,
            target,
        }
    }

    /// Resolves the replay plan.
    ///
    /// Same-name items found on the target are recorded in the remap table
    /// immediately, before anything is pushed. A target index that cannot
    /// be loaded aborts that category (counted as a failure); the remaining
    /// categories still resolve.
    pub fn resolve(
        &self,
        options: &ResolveOptions,
        ctx: &mut RunContext,
    ) -> EngineResult<ReplayPlan> {
        let descriptors = self.catalog.ordered(&options.tag, false)?;

        let mut plan = ReplayPlan::default();
        for descriptor in descriptors {
            let explicit =
                options.tag == WILDCARD_TAG || descriptor.tag == options.tag;

            let Some(source_index) = self.source.load_index(descriptor.category)? else {
                debug!(category = descriptor.category, "not present on source");
                continue;
            };

            let target_index = match self.target.index(descriptor.category) {
                Ok(index) => index.unwrap_or_default(),
                Err(e) => {
                    error!(category = descriptor.category, error = %e,
                           "target index load failed, skipping category");
                    ctx.tally.failures += 1;
                    continue;
                }
            };

            let entries =
                self.resolve_category(descriptor, &source_index, &target_index, explicit,
                                      options, &mut plan.closure, ctx)?;

            if !entries.is_empty() {
                plan.categories.push(CategoryPlan {
                    descriptor: *descriptor,
                    target_index,
                    entries,
                });
            }
        }

        debug!(
            matched = plan.closure.matched.len(),
            dependencies = plan.closure.dependencies.len(),
            scheduled = plan.item_count(),
            "resolution complete"
        );
        Ok(plan)
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_category(
        &self,
        descriptor: &CategoryDescriptor,
        source_index: &Index,
        target_index: &Index,
        explicit: bool,
        options: &ResolveOptions,
        closure: &mut DependencyClosure,
        ctx: &mut RunContext,
    ) -> EngineResult<Vec<PlanEntry>> {
        let mut entries = Vec::new();

        for index_entry in source_index {
            let Some(item) =
                self.source
                    .load_item(descriptor.category, &index_entry.id, &index_entry.name)?
            else {
                warn!(category = descriptor.category, name = %index_entry.name,
                      "indexed item missing from source");
                ctx.tally.warnings += 1;
                continue;
            };

            let existing_id = target_index.id_for_name(&item.name).map(String::from);
            if let Some(target_id) = &existing_id {
                // Record the reconciliation up front so references to this
                // item resolve even if it is never pushed.
                ctx.remap.insert(&item.id, target_id);
            }

            let matched = explicit && !item.read_only && options.name_matches(&item.name);
            let required = closure.dependencies.contains(&item.id);
            if !matched && !required {
                continue;
            }

            if item.read_only {
                // Factory-default content cannot be recreated on the
                // target; it is a dependency only if it already exists
                // there under the same name.
                warn!(category = descriptor.category, name = %item.name,
                      "read-only item required as a dependency, treated as pre-existing");
                ctx.tally.warnings += 1;
                continue;
            }

            if matched {
                closure.matched.insert(item.id.clone());
            }
            for reference in payload::reference_set(&item) {
                closure.dependencies.insert(reference);
            }

            if existing_id.is_some() && !options.force_update {
                debug!(category = descriptor.category, name = %item.name,
                       "already on target, skipped");
                continue;
            }

            entries.push(PlanEntry {
                item,
                target_id: existing_id,
                matched,
            });
        }

        Ok(entries)
    }
}
