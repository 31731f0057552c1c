//! # confsync Engine
//!
//! Orchestration engine for configuration lifecycle operations.
//!
//! This crate provides:
//! - Dependency resolution (closed item set + safe processing order)
//! - The push engine (create/update with identifier reconciliation)
//! - Asynchronous action tracking (poll until terminal, bounded budget)
//! - Batch accumulation for device-scale operations
//! - The live-target adapter over the REST transport
//!
//! ## Architecture
//!
//! One orchestration run resolves a replay plan from a source (snapshot or
//! live system), then pushes it category by category against the target.
//! Categories are processed leaves first on create/update and dependents
//! first on delete. The identifier remap table is the bridge between the
//! two backends: recorded when an item is found or created on the target,
//! consulted when later payloads are rewritten.
//!
//! ## Key Invariants
//!
//! - A dependency category always finishes before its dependents start
//! - A remapped identifier is never remapped to a different value
//! - Pushing an unchanged item is a no-op (idempotence)
//! - Failures abort the item, not the run; the run outcome aggregates them
//! - Dry-run mode never issues a mutating call

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attach;
mod batch;
mod error;
mod live;
mod monitor;
mod push;
mod resolver;
mod run;
mod target;

pub use attach::{AttachUnit, AttachmentDriver, DEFAULT_CHUNK_SIZE};
pub use batch::{BatchAccumulator, BatchRequest, BatchSection};
pub use error::{EngineError, EngineResult};
pub use live::LiveTarget;
pub use monitor::{ActionMonitor, ActionState, MonitorConfig, PendingAction};
pub use push::{DeleteOptions, ItemOutcome, ItemResult, PushEngine, PushReport};
pub use resolver::{
    CategoryPlan, DependencyClosure, DependencyResolver, PlanEntry, ReplayPlan, ResolveOptions,
};
pub use run::{RunContext, RunTally};
pub use target::{
    ActionHandle, ActionStatus, MemorySource, MemoryTarget, Target, WriteRecord, WriteResponse,
};
