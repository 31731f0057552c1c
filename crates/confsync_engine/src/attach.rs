//! Attachment, detach and activation sub-protocols.
//!
//! These are the asynchronous follow-ups of the push protocol: device
//! attachments grouped through the batch accumulator, detaches, and policy
//! activations, all driven to completion by the action monitor. The push
//! engine invokes them when a write signals that it invalidated existing
//! state; the CLI attach/detach tasks invoke them directly.

use crate::batch::BatchAccumulator;
use crate::error::EngineResult;
use crate::monitor::{ActionMonitor, MonitorConfig};
use crate::run::RunContext;
use crate::target::Target;
use serde_json::Value;
use tracing::info;

/// Default request size ceiling, validated against the managed system.
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// One device attachment work unit.
#[derive(Debug, Clone)]
pub struct AttachUnit {
    /// Target-side device template id (batch primary key).
    pub template_id: String,
    /// Device identifier (batch secondary key).
    pub device_id: String,
    /// The device's attachment input values.
    pub values: Value,
}

/// Drives attachment-family operations end to end.
pub struct AttachmentDriver<'a, T: Target + ?Sized> {
    target: &'a T,
    monitor: MonitorConfig,
    chunk_size: usize,
}

impl<'a, T: Target + ?Sized> AttachmentDriver<'a, T> {
    /// Creates a driver with default batching and polling configuration.
    pub fn new(target: &'a T) -> Self {
        Self {
            target,
            monitor: MonitorConfig::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets the batch chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the polling configuration.
    pub fn with_monitor_config(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Attaches devices to their templates.
    ///
    /// Units are grouped per template and chunked so one request never
    /// exceeds the configured ceiling; each flushed request becomes one
    /// submitted action. Returns true when every action succeeded.
    pub fn attach(
        &self,
        units: Vec<AttachUnit>,
        context: &str,
        ctx: &mut RunContext,
        raise_on_failure: bool,
    ) -> EngineResult<bool> {
        if units.is_empty() {
            return Ok(true);
        }

        let mut accumulator = BatchAccumulator::new(self.chunk_size);
        for unit in units {
            accumulator.add(unit.template_id, unit.device_id, unit.values);
        }

        let mut handles = Vec::new();
        for section in accumulator.flush() {
            for request in &section.requests {
                let description = format!(
                    "attach {} devices to template {}",
                    request.len(),
                    request.primary_key
                );
                if ctx.dry_run {
                    ctx.record_planned(description);
                    continue;
                }
                let handle = self.target.submit_attachment(request)?;
                handles.push((handle, description));
            }
        }

        self.finish(handles, context, ctx, raise_on_failure)
    }

    /// Detaches devices from one template.
    pub fn detach(
        &self,
        template_id: &str,
        device_ids: Vec<String>,
        context: &str,
        ctx: &mut RunContext,
        raise_on_failure: bool,
    ) -> EngineResult<bool> {
        if device_ids.is_empty() {
            return Ok(true);
        }

        let description = format!(
            "detach {} devices from template {template_id}",
            device_ids.len()
        );
        if ctx.dry_run {
            ctx.record_planned(description);
            return Ok(true);
        }

        let handle = self.target.submit_detach(template_id, &device_ids)?;
        self.finish(vec![(handle, description)], context, ctx, raise_on_failure)
    }

    /// Activates policies.
    pub fn reactivate(
        &self,
        policy_ids: &[String],
        context: &str,
        ctx: &mut RunContext,
        raise_on_failure: bool,
    ) -> EngineResult<bool> {
        let mut handles = Vec::new();
        for policy_id in policy_ids {
            let description = format!("activate policy {policy_id}");
            if ctx.dry_run {
                ctx.record_planned(description);
                continue;
            }
            let handle = self.target.activate_policy(policy_id)?;
            handles.push((handle, description));
        }

        self.finish(handles, context, ctx, raise_on_failure)
    }

    fn finish(
        &self,
        handles: Vec<(crate::target::ActionHandle, String)>,
        context: &str,
        ctx: &mut RunContext,
        raise_on_failure: bool,
    ) -> EngineResult<bool> {
        if handles.is_empty() {
            return Ok(true);
        }

        info!(context, actions = handles.len(), "submitted");
        let monitor = ActionMonitor::new(self.target, self.monitor.clone());
        let all_ok = monitor.wait_for(handles, context, raise_on_failure)?;
        if !all_ok {
            // The caller chose not to escalate; keep a trace in the tally.
            ctx.tally.warnings += 1;
        }
        Ok(all_ok)
    }
}
