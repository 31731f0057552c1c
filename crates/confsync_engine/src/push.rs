//! The push engine.
//!
//! Applies a replay plan against the target: categories in reverse plan
//! order (leaves first), items in resolver order within each category.
//! Failures abort the item, never the run; the report and the run tally
//! carry the aggregate outcome.

use crate::attach::{AttachUnit, AttachmentDriver, DEFAULT_CHUNK_SIZE};
use crate::error::EngineResult;
use crate::monitor::MonitorConfig;
use crate::resolver::{CategoryPlan, PlanEntry, ReplayPlan};
use crate::run::RunContext;
use crate::target::{Target, WriteResponse};
use confsync_catalog::{Catalog, WILDCARD_TAG};
use confsync_core::payload;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Outcome of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Created on the target. Carries the echoed id when the backend sent
    /// one; otherwise the id is reconciled from the index afterwards.
    Created(Option<String>),
    /// Updated in place.
    Updated,
    /// Skipped: the target already matched.
    Skipped,
    /// Deleted from the target.
    Deleted,
    /// Dry run: the action that would have been taken.
    Planned(String),
    /// Failed; the run continued with the next item.
    Failed(String),
}

/// Per-item record of a push or delete pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    /// Item category.
    pub category: String,
    /// Item name.
    pub name: String,
    /// Source-side id (target-side for deletes).
    pub id: String,
    /// What happened.
    pub outcome: ItemOutcome,
}

/// Everything that happened during one pass.
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    /// Per-item results in processing order.
    pub results: Vec<ItemResult>,
}

impl PushReport {
    fn record(&mut self, category: &str, name: &str, id: &str, outcome: ItemOutcome) {
        self.results.push(ItemResult {
            category: category.to_string(),
            name: name.to_string(),
            id: id.to_string(),
            outcome,
        });
    }

    /// Results that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, ItemOutcome::Failed(_)))
    }
}

/// What to delete.
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Requested category tag, or the wildcard.
    pub tag: String,
    /// Only names matching this pattern are deleted.
    pub include: Option<Regex>,
    /// Names matching this pattern are kept.
    pub exclude: Option<Regex>,
    /// Detach attached devices before deleting device templates.
    pub detach: bool,
}

impl DeleteOptions {
    /// Deletes everything under `tag` with no name filters.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            include: None,
            exclude: None,
            detach: false,
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

    /// Enables detach-before-delete.
    pub fn with_detach(mut self, detach: bool) -> Self {
        self.detach = detach;
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

/// Applies replay plans and delete passes against a target.
pub struct PushEngine<'a, T: Target + ?Sized> {
    target: &'a T,
    catalog: &'a Catalog,
    monitor: MonitorConfig,
    chunk_size: usize,
    strict_actions: bool,
}

impl<'a, T: Target + ?Sized> PushEngine<'a, T> {
    /// Creates an engine with default polling and batching configuration.
    pub fn new(target: &'a T, catalog: &'a Catalog) -> Self {
        Self {
            target,
            catalog,
            monitor: MonitorConfig::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            strict_actions: true,
        }
    }

    /// Sets the polling configuration for follow-up actions.
    pub fn with_monitor_config(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Sets the batch chunk size for follow-up attachments.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Downgrades failed follow-up actions from task aborts to warnings.
    pub fn with_lenient_actions(mut self) -> Self {
        self.strict_actions = false;
        self
    }

    /// Pushes a replay plan.
    ///
    /// Categories are processed in the reverse of the plan order, so
    /// dependencies are created before their dependents. After a category
    /// with creates, the target index is re-read to pick up ids the create
    /// responses did not echo. Write signals (invalidated attachments or
    /// policy activations) are redriven before the next category starts.
    pub fn push(&self, plan: &ReplayPlan, ctx: &mut RunContext) -> EngineResult<PushReport> {
        let mut report = PushReport::default();

        for category_plan in plan.categories.iter().rev() {
            self.push_category(category_plan, ctx, &mut report)?;
        }

        info!(
            created = ctx.tally.created,
            updated = ctx.tally.updated,
            skipped = ctx.tally.skipped,
            failures = ctx.tally.failures,
            "push finished"
        );
        Ok(report)
    }

    fn push_category(
        &self,
        category_plan: &CategoryPlan,
        ctx: &mut RunContext,
        report: &mut PushReport,
    ) -> EngineResult<()> {
        let descriptor = &category_plan.descriptor;
        debug!(category = descriptor.category, items = category_plan.entries.len(),
               "pushing category");

        let mut created_any = false;
        let mut reattach: BTreeSet<String> = BTreeSet::new();
        let mut reactivate: BTreeSet<String> = BTreeSet::new();

        for entry in &category_plan.entries {
            let outcome = self.push_item(descriptor.category, descriptor.id_field, entry, ctx,
                                         &mut reattach, &mut reactivate);
            if matches!(outcome, ItemOutcome::Created(_)) {
                created_any = true;
            }
            report.record(descriptor.category, &entry.item.name, &entry.item.id, outcome);
        }

        if created_any && !ctx.dry_run {
            self.reconcile_created_ids(descriptor.category, &category_plan.entries, ctx);
        }

        if !reattach.is_empty() {
            self.redrive_attachments(&reattach, ctx)?;
        }
        if !reactivate.is_empty() {
            let policy_ids: Vec<String> = reactivate.into_iter().collect();
            AttachmentDriver::new(self.target)
                .with_monitor_config(self.monitor.clone())
                .reactivate(&policy_ids, "reactivating policies", ctx, self.strict_actions)?;
        }

        Ok(())
    }

    fn push_item(
        &self,
        category: &str,
        id_field: &str,
        entry: &PlanEntry,
        ctx: &mut RunContext,
        reattach: &mut BTreeSet<String>,
        reactivate: &mut BTreeSet<String>,
    ) -> ItemOutcome {
        let item = &entry.item;

        for reference in payload::reference_set(item) {
            if !ctx.remap.contains(&reference) {
                // Data-quality issue in the source, not an orchestration
                // bug: the token passes through and the backend decides.
                warn!(category, name = %item.name, %reference,
                      "unresolved reference left unmapped");
                ctx.tally.warnings += 1;
            }
        }

        let prepared = payload::substitute_ids(&item.payload, &ctx.remap);

        match &entry.target_id {
            None => self.create(category, item, &prepared, ctx, reattach, reactivate),
            Some(target_id) => self.update(
                category, id_field, item, target_id, &prepared, ctx, reattach, reactivate,
            ),
        }
    }

    fn create(
        &self,
        category: &str,
        item: &confsync_core::Item,
        prepared: &Value,
        ctx: &mut RunContext,
        reattach: &mut BTreeSet<String>,
        reactivate: &mut BTreeSet<String>,
    ) -> ItemOutcome {
        if ctx.dry_run {
            let action = format!("create {category} {}", item.name);
            ctx.record_planned(action.clone());
            return ItemOutcome::Planned(action);
        }

        match self.target.create_item(category, prepared) {
            Ok(response) => {
                ctx.tally.created += 1;
                if let Some(new_id) = &response.id {
                    ctx.remap.insert(&item.id, new_id);
                }
                self.collect_signals(&response, response.id.as_deref(), reattach, reactivate);
                debug!(category, name = %item.name, "created");
                ItemOutcome::Created(response.id)
            }
            Err(e) => {
                error!(category, name = %item.name, id = %item.id, error = %e, "create failed");
                ctx.tally.failures += 1;
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn update(
        &self,
        category: &str,
        id_field: &str,
        item: &confsync_core::Item,
        target_id: &str,
        prepared: &Value,
        ctx: &mut RunContext,
        reattach: &mut BTreeSet<String>,
        reactivate: &mut BTreeSet<String>,
    ) -> ItemOutcome {
        // Idempotence: an update that would not change the target is not
        // issued at all.
        let current = match self.target.item(category, target_id, &item.name) {
            Ok(current) => current,
            Err(e) => {
                error!(category, name = %item.name, id = %item.id, error = %e,
                       "target read failed");
                ctx.tally.failures += 1;
                return ItemOutcome::Failed(e.to_string());
            }
        };

        if let Some(current) = &current {
            if payload::semantically_equal(prepared, &current.payload, &[id_field]) {
                debug!(category, name = %item.name, "unchanged, skipped");
                ctx.tally.skipped += 1;
                return ItemOutcome::Skipped;
            }
        }

        if ctx.dry_run {
            let action = format!("update {category} {}", item.name);
            ctx.record_planned(action.clone());
            return ItemOutcome::Planned(action);
        }

        match self.target.update_item(category, target_id, prepared) {
            Ok(response) => {
                ctx.tally.updated += 1;
                self.collect_signals(&response, Some(target_id), reattach, reactivate);
                debug!(category, name = %item.name, "updated");
                ItemOutcome::Updated
            }
            Err(e) => {
                error!(category, name = %item.name, id = %item.id, error = %e, "update failed");
                ctx.tally.failures += 1;
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    fn collect_signals(
        &self,
        response: &WriteResponse,
        written_id: Option<&str>,
        reattach: &mut BTreeSet<String>,
        reactivate: &mut BTreeSet<String>,
    ) {
        for template_id in &response.needs_reattach {
            reattach.insert(template_id.clone());
        }
        if response.needs_reactivate {
            if let Some(id) = written_id {
                reactivate.insert(id.to_string());
            }
        }
    }

    /// Re-reads the target index and reconciles ids for creates whose
    /// response omitted the new id. First-write-wins keeps echoed ids
    /// intact.
    fn reconcile_created_ids(&self, category: &str, entries: &[PlanEntry], ctx: &mut RunContext) {
        let index = match self.target.index(category) {
            Ok(Some(index)) => index,
            Ok(None) => {
                warn!(category, "index unavailable after creates");
                ctx.tally.warnings += 1;
                return;
            }
            Err(e) => {
                error!(category, error = %e, "index re-read failed after creates");
                ctx.tally.failures += 1;
                return;
            }
        };

        for entry in entries {
            if ctx.remap.contains(&entry.item.id) {
                continue;
            }
            match index.id_for_name(&entry.item.name) {
                Some(new_id) => {
                    ctx.remap.insert(&entry.item.id, new_id);
                }
                None => {
                    warn!(category, name = %entry.item.name,
                          "created item not present in re-read index");
                    ctx.tally.warnings += 1;
                }
            }
        }
    }

    fn redrive_attachments(
        &self,
        template_ids: &BTreeSet<String>,
        ctx: &mut RunContext,
    ) -> EngineResult<()> {
        let mut units = Vec::new();
        for template_id in template_ids {
            match self.target.attached_devices(template_id) {
                Ok(devices) => {
                    for values in devices {
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
                Err(e) => {
                    error!(template_id, error = %e, "attachment listing failed");
                    ctx.tally.failures += 1;
                }
            }
        }

        AttachmentDriver::new(self.target)
            .with_chunk_size(self.chunk_size)
            .with_monitor_config(self.monitor.clone())
            .attach(units, "reattaching device templates", ctx, self.strict_actions)?;
        Ok(())
    }

    /// Deletes explicitly matched items, dependents-first.
    ///
    /// Only filter matches are deleted; items a previous run pulled in as
    /// dependencies are never deleted standalone. Read-only items are
    /// skipped.
    pub fn delete_matching(
        &self,
        options: &DeleteOptions,
        ctx: &mut RunContext,
    ) -> EngineResult<PushReport> {
        let descriptors = self.catalog.ordered(&options.tag, false)?;
        let mut report = PushReport::default();

        for descriptor in descriptors {
            if !(options.tag == WILDCARD_TAG || descriptor.tag == options.tag) {
                continue;
            }

            let index = match self.target.index(descriptor.category) {
                Ok(Some(index)) => index,
                Ok(None) => continue,
                Err(e) => {
                    error!(category = descriptor.category, error = %e,
                           "target index load failed, skipping category");
                    ctx.tally.failures += 1;
                    continue;
                }
            };

            for index_entry in &index {
                if !options.name_matches(&index_entry.name) {
                    continue;
                }
                let outcome =
                    self.delete_item(descriptor.category, &index_entry.id, &index_entry.name,
                                     options, ctx);
                if let Some(outcome) = outcome {
                    report.record(descriptor.category, &index_entry.name, &index_entry.id,
                                  outcome);
                }
            }
        }

        info!(deleted = ctx.tally.deleted, failures = ctx.tally.failures, "delete finished");
        Ok(report)
    }

    fn delete_item(
        &self,
        category: &str,
        id: &str,
        name: &str,
        options: &DeleteOptions,
        ctx: &mut RunContext,
    ) -> Option<ItemOutcome> {
        match self.target.item(category, id, name) {
            Ok(Some(item)) if item.read_only => {
                debug!(category, name, "read-only, not deleted");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                error!(category, name, error = %e, "target read failed");
                ctx.tally.failures += 1;
                return Some(ItemOutcome::Failed(e.to_string()));
            }
        }

        if options.detach && category == "template_device" {
            if let Err(e) = self.detach_before_delete(id, ctx) {
                error!(category, name, error = %e, "detach before delete failed");
                ctx.tally.failures += 1;
                return Some(ItemOutcome::Failed(e.to_string()));
            }
        }

        if ctx.dry_run {
            let action = format!("delete {category} {name}");
            ctx.record_planned(action.clone());
            return Some(ItemOutcome::Planned(action));
        }

        match self.target.delete_item(category, id) {
            Ok(()) => {
                ctx.tally.deleted += 1;
                debug!(category, name, "deleted");
                Some(ItemOutcome::Deleted)
            }
            Err(e) => {
                error!(category, name, id, error = %e, "delete failed");
                ctx.tally.failures += 1;
                Some(ItemOutcome::Failed(e.to_string()))
            }
        }
    }

    fn detach_before_delete(&self, template_id: &str, ctx: &mut RunContext) -> EngineResult<()> {
        let devices = self.target.attached_devices(template_id)?;
        let device_ids: Vec<String> = devices
            .iter()
            .filter_map(|d| d.get("uuid").and_then(Value::as_str))
            .map(String::from)
            .collect();

        AttachmentDriver::new(self.target)
            .with_monitor_config(self.monitor.clone())
            .detach(template_id, device_ids, "detaching before delete", ctx,
                    self.strict_actions)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DependencyResolver, ResolveOptions};
    use crate::target::{MemorySource, MemoryTarget, WriteRecord};
    use confsync_core::Item;
    use serde_json::json;
    use std::time::Duration;

    const L1: &str = "11111111-0000-0000-0000-000000000001";
    const T1: &str = "33333333-0000-0000-0000-000000000001";

    fn fast_engine<'a>(
        target: &'a MemoryTarget,
        catalog: &'a Catalog,
    ) -> PushEngine<'a, MemoryTarget> {
        PushEngine::new(target, catalog).with_monitor_config(
            MonitorConfig::new()
                .with_poll_interval(Duration::from_millis(1))
                .with_wait_budget(Duration::from_millis(20)),
        )
    }

    fn list_item(id: &str, name: &str) -> Item {
        Item::new(
            id,
            name,
            "policy_list_site",
            json!({"listId": id, "name": name, "entries": [{"site": 100}]}),
        )
    }

    fn resolve(
        catalog: &Catalog,
        source: &MemorySource,
        target: &MemoryTarget,
        options: &ResolveOptions,
        ctx: &mut RunContext,
    ) -> ReplayPlan {
        DependencyResolver::new(catalog, source, target)
            .resolve(options, ctx)
            .unwrap()
    }

    #[test]
    fn create_records_remap() {
        let catalog = Catalog::builtin();
        let mut source = MemorySource::new();
        source.add(list_item(L1, "corp-sites"));

        let target = MemoryTarget::new();
        let mut ctx = RunContext::new();
        let plan = resolve(&catalog, &source, &target, &ResolveOptions::new("policy_list"),
                           &mut ctx);

        let report = fast_engine(&target, &catalog).push(&plan, &mut ctx).unwrap();

        assert_eq!(ctx.tally.created, 1);
        assert!(ctx.remap.contains(L1));
        assert!(matches!(report.results[0].outcome, ItemOutcome::Created(Some(_))));
    }

    #[test]
    fn create_without_echo_reconciles_from_index() {
        let catalog = Catalog::builtin();
        let mut source = MemorySource::new();
        source.add(list_item(L1, "corp-sites"));

        let target = MemoryTarget::new().without_create_id_echo();
        let mut ctx = RunContext::new();
        let plan = resolve(&catalog, &source, &target, &ResolveOptions::new("policy_list"),
                           &mut ctx);

        fast_engine(&target, &catalog).push(&plan, &mut ctx).unwrap();

        // The id was not echoed, so it came from the re-read index.
        let new_id = ctx.remap.get(L1).unwrap();
        let index = target.index("policy_list_site").unwrap().unwrap();
        assert_eq!(index.id_for_name("corp-sites"), Some(new_id));
    }

    #[test]
    fn force_update_skips_semantically_equal_items() {
        let catalog = Catalog::builtin();
        let mut source = MemorySource::new();
        source.add(list_item(L1, "corp-sites"));

        let target = MemoryTarget::new();
        // Same content, different id and volatile fields.
        target.seed(Item::new(
            "P7",
            "corp-sites",
            "policy_list_site",
            json!({"listId": "P7", "name": "corp-sites", "entries": [{"site": 100}],
                   "lastUpdatedOn": 99}),
        ));

        let mut ctx = RunContext::new();
        let options = ResolveOptions::new("policy_list").with_force_update(true);
        let plan = resolve(&catalog, &source, &target, &options, &mut ctx);

        let report = fast_engine(&target, &catalog).push(&plan, &mut ctx).unwrap();

        assert_eq!(ctx.tally.skipped, 1);
        assert_eq!(ctx.tally.updated, 0);
        assert_eq!(target.write_count(), 0);
        assert_eq!(report.results[0].outcome, ItemOutcome::Skipped);
    }

    #[test]
    fn force_update_writes_changed_items() {
        let catalog = Catalog::builtin();
        let mut source = MemorySource::new();
        source.add(list_item(L1, "corp-sites"));

        let target = MemoryTarget::new();
        target.seed(Item::new(
            "P7",
            "corp-sites",
            "policy_list_site",
            json!({"listId": "P7", "name": "corp-sites", "entries": [{"site": 999}]}),
        ));

        let mut ctx = RunContext::new();
        let options = ResolveOptions::new("policy_list").with_force_update(true);
        let plan = resolve(&catalog, &source, &target, &options, &mut ctx);

        fast_engine(&target, &catalog).push(&plan, &mut ctx).unwrap();

        assert_eq!(ctx.tally.updated, 1);
        assert!(matches!(
            target.writes()[0],
            WriteRecord::Update { ref id, .. } if id == "P7"
        ));
    }

    #[test]
    fn per_item_failure_continues_the_run() {
        struct FailFirstCreate {
            inner: MemoryTarget,
            failed: std::sync::atomic::AtomicBool,
        }

        impl Target for FailFirstCreate {
            fn index(&self, c: &str) -> EngineResult<Option<confsync_core::Index>> {
                self.inner.index(c)
            }
            fn item(&self, c: &str, i: &str, n: &str) -> EngineResult<Option<Item>> {
                self.inner.item(c, i, n)
            }
            fn create_item(&self, c: &str, p: &Value) -> EngineResult<WriteResponse> {
                if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                    return Err(crate::error::EngineError::unexpected_response(c, "boom"));
                }
                self.inner.create_item(c, p)
            }
            fn update_item(&self, c: &str, i: &str, p: &Value) -> EngineResult<WriteResponse> {
                self.inner.update_item(c, i, p)
            }
            fn delete_item(&self, c: &str, i: &str) -> EngineResult<()> {
                self.inner.delete_item(c, i)
            }
            fn attached_devices(&self, t: &str) -> EngineResult<Vec<Value>> {
                self.inner.attached_devices(t)
            }
            fn submit_attachment(
                &self,
                r: &crate::batch::BatchRequest,
            ) -> EngineResult<crate::target::ActionHandle> {
                self.inner.submit_attachment(r)
            }
            fn submit_detach(
                &self,
                t: &str,
                d: &[String],
            ) -> EngineResult<crate::target::ActionHandle> {
                self.inner.submit_detach(t, d)
            }
            fn activate_policy(&self, p: &str) -> EngineResult<crate::target::ActionHandle> {
                self.inner.activate_policy(p)
            }
            fn action_status(&self, a: &str) -> EngineResult<crate::target::ActionStatus> {
                self.inner.action_status(a)
            }
        }

        let catalog = Catalog::builtin();
        let mut source = MemorySource::new();
        source.add(list_item(L1, "alpha"));
        source.add(list_item(T1, "beta"));

        let target = FailFirstCreate {
            inner: MemoryTarget::new(),
            failed: std::sync::atomic::AtomicBool::new(false),
        };

        let mut ctx = RunContext::new();
        let plan = DependencyResolver::new(&catalog, &source, &target)
            .resolve(&ResolveOptions::new("policy_list"), &mut ctx)
            .unwrap();

        let engine = PushEngine::new(&target, &catalog);
        let report = engine.push(&plan, &mut ctx).unwrap();

        // First item failed, second was still created.
        assert_eq!(ctx.tally.failures, 1);
        assert_eq!(ctx.tally.created, 1);
        assert!(!ctx.tally.succeeded());
        assert_eq!(report.failures().count(), 1);
        // No mapping was recorded for the failed item.
        assert!(!ctx.remap.contains(L1));
        assert!(ctx.remap.contains(T1));
    }

    #[test]
    fn reattach_signal_redrives_attachments() {
        let catalog = Catalog::builtin();
        let mut source = MemorySource::new();
        source.add(Item::new(
            T1,
            "branch",
            "template_device",
            json!({"templateId": T1, "templateName": "branch", "configType": "template",
                   "spec": 2}),
        ));

        let target = MemoryTarget::new();
        target.seed(Item::new(
            "tgt-tpl",
            "branch",
            "template_device",
            json!({"templateId": "tgt-tpl", "templateName": "branch",
                   "configType": "template", "spec": 1}),
        ));
        target.seed_attachments(
            "tgt-tpl",
            vec![json!({"uuid": "dev-1"}), json!({"uuid": "dev-2"})],
        );
        target.script_reattach("template_device", "branch", vec!["tgt-tpl".into()]);

        let mut ctx = RunContext::new();
        let options = ResolveOptions::new("template_device").with_force_update(true);
        let plan = resolve(&catalog, &source, &target, &options, &mut ctx);

        fast_engine(&target, &catalog).push(&plan, &mut ctx).unwrap();

        let attached: Vec<(String, usize)> = target
            .writes()
            .iter()
            .filter_map(|w| match w {
                WriteRecord::Attach { template_id, devices } => {
                    Some((template_id.clone(), *devices))
                }
                _ => None,
            })
            .collect();
        assert_eq!(attached, vec![("tgt-tpl".to_string(), 2)]);
        assert_eq!(ctx.tally.updated, 1);
    }

    #[test]
    fn reactivate_signal_activates_policy() {
        let catalog = Catalog::builtin();
        let mut source = MemorySource::new();
        source.add(Item::new(
            L1,
            "corp-policy",
            "policy_vsmart",
            json!({"policyId": L1, "policyName": "corp-policy", "definition": 2}),
        ));

        let target = MemoryTarget::new();
        target.seed(Item::new(
            "P7",
            "corp-policy",
            "policy_vsmart",
            json!({"policyId": "P7", "policyName": "corp-policy", "definition": 1}),
        ));
        target.script_reactivate("policy_vsmart", "corp-policy");

        let mut ctx = RunContext::new();
        let options = ResolveOptions::new("policy_vsmart").with_force_update(true);
        let plan = resolve(&catalog, &source, &target, &options, &mut ctx);

        fast_engine(&target, &catalog).push(&plan, &mut ctx).unwrap();

        assert!(target
            .writes()
            .iter()
            .any(|w| matches!(w, WriteRecord::Activate { policy_id } if policy_id == "P7")));
    }

    #[test]
    fn dry_run_issues_no_mutations() {
        let catalog = Catalog::builtin();
        let mut source = MemorySource::new();
        source.add(list_item(L1, "corp-sites"));

        let target = MemoryTarget::new();
        let mut ctx = RunContext::dry_run();
        let plan = resolve(&catalog, &source, &target, &ResolveOptions::new("policy_list"),
                           &mut ctx);

        let report = fast_engine(&target, &catalog).push(&plan, &mut ctx).unwrap();

        assert_eq!(target.write_count(), 0);
        assert_eq!(ctx.planned, vec!["create policy_list_site corp-sites".to_string()]);
        assert!(matches!(report.results[0].outcome, ItemOutcome::Planned(_)));
    }

    #[test]
    fn delete_matching_respects_filters_and_order() {
        let catalog = Catalog::builtin();
        let target = MemoryTarget::new();
        target.seed(list_item("l-1", "corp-sites"));
        target.seed(list_item("l-2", "lab-sites"));
        target.seed(Item::new(
            "d-1",
            "corp-qos",
            "policy_definition",
            json!({"definitionId": "d-1", "name": "corp-qos"}),
        ));

        let mut ctx = RunContext::new();
        let options = DeleteOptions::new(WILDCARD_TAG)
            .with_include(Regex::new("^corp-").unwrap());
        let report = fast_engine(&target, &catalog)
            .delete_matching(&options, &mut ctx)
            .unwrap();

        assert_eq!(ctx.tally.deleted, 2);
        // Dependents (definitions) deleted before leaves (lists).
        let deleted: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(deleted, vec!["corp-qos", "corp-sites"]);
        assert_eq!(target.items_in("policy_list_site").len(), 1);
    }

    #[test]
    fn delete_skips_read_only_items() {
        let catalog = Catalog::builtin();
        let target = MemoryTarget::new();
        let mut factory = list_item("l-1", "Factory_Default_Sites");
        factory.read_only = true;
        target.seed(factory);

        let mut ctx = RunContext::new();
        let report = fast_engine(&target, &catalog)
            .delete_matching(&DeleteOptions::new("policy_list"), &mut ctx)
            .unwrap();

        assert_eq!(ctx.tally.deleted, 0);
        assert!(report.results.is_empty());
        assert_eq!(target.items_in("policy_list_site").len(), 1);
    }

    #[test]
    fn delete_with_detach_detaches_first() {
        let catalog = Catalog::builtin();
        let target = MemoryTarget::new();
        target.seed(Item::new(
            "tpl-1",
            "branch",
            "template_device",
            json!({"templateId": "tpl-1", "templateName": "branch",
                   "configType": "template"}),
        ));
        target.seed_attachments("tpl-1", vec![json!({"uuid": "dev-1"})]);

        let mut ctx = RunContext::new();
        let options = DeleteOptions::new("template_device").with_detach(true);
        fast_engine(&target, &catalog)
            .delete_matching(&options, &mut ctx)
            .unwrap();

        let writes = target.writes();
        assert!(matches!(writes[0], WriteRecord::Detach { .. }));
        assert!(matches!(writes[1], WriteRecord::Delete { .. }));
    }
}
