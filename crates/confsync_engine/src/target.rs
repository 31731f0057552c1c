//! The write seam over the managed system.

use crate::batch::BatchRequest;
use crate::error::EngineResult;
use confsync_catalog::Catalog;
use confsync_core::{ConfigSource, CoreResult, Index, Item};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

/// Result of a create/update call against the target.
///
/// `needs_reattach` and `needs_reactivate` are the write signals of the
/// push protocol: an update can invalidate existing downstream attachments
/// (they must be redriven) or an active policy selection (it must be
/// reactivated) before the run moves on.
#[derive(Debug, Clone, Default)]
pub struct WriteResponse {
    /// Server-assigned id, when the backend echoes one.
    pub id: Option<String>,
    /// Target-side ids of device templates whose attachments were
    /// invalidated by this write.
    pub needs_reattach: Vec<String>,
    /// Whether the written policy must be reactivated.
    pub needs_reactivate: bool,
}

impl WriteResponse {
    /// A response that echoes the assigned id and signals nothing.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Handle for a submitted asynchronous server-side operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionHandle {
    /// Backend-assigned action id, polled for status.
    pub id: String,
}

/// Status of an asynchronous operation as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// Still running.
    InProgress,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failure(String),
}

/// The managed system as seen by the orchestration engine.
///
/// Reads mirror [`ConfigSource`]; writes cover item CRUD plus the
/// asynchronous sub-protocols (attachment, detach, policy activation).
/// Implementations: [`LiveTarget`](crate::LiveTarget) over the REST
/// transport, [`MemoryTarget`] for tests.
pub trait Target: Send + Sync {
    /// Loads the id/name index for one category, if the backend has one.
    fn index(&self, category: &str) -> EngineResult<Option<Index>>;

    /// Loads one item, if present.
    fn item(&self, category: &str, id: &str, name: &str) -> EngineResult<Option<Item>>;

    /// Creates an item from a prepared payload.
    fn create_item(&self, category: &str, payload: &Value) -> EngineResult<WriteResponse>;

    /// Updates the item identified by `id` with a prepared payload.
    fn update_item(&self, category: &str, id: &str, payload: &Value)
        -> EngineResult<WriteResponse>;

    /// Deletes the item identified by `id`.
    fn delete_item(&self, category: &str, id: &str) -> EngineResult<()>;

    /// Current attachment records (device entries with their input values)
    /// of one device template.
    fn attached_devices(&self, template_id: &str) -> EngineResult<Vec<Value>>;

    /// Submits one attachment batch request.
    fn submit_attachment(&self, request: &BatchRequest) -> EngineResult<ActionHandle>;

    /// Submits a detach of the given devices from a device template.
    fn submit_detach(&self, template_id: &str, device_ids: &[String])
        -> EngineResult<ActionHandle>;

    /// Submits a policy activation.
    fn activate_policy(&self, policy_id: &str) -> EngineResult<ActionHandle>;

    /// Polls the status of a submitted action.
    fn action_status(&self, action_id: &str) -> EngineResult<ActionStatus>;
}

/// One recorded mutating call against a [`MemoryTarget`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    /// `create_item` was called.
    Create {
        /// Category written to.
        category: String,
        /// Item name extracted from the payload.
        name: String,
        /// The payload as received.
        payload: Value,
    },
    /// `update_item` was called.
    Update {
        /// Category written to.
        category: String,
        /// Target-side id.
        id: String,
        /// The payload as received.
        payload: Value,
    },
    /// `delete_item` was called.
    Delete {
        /// Category written to.
        category: String,
        /// Target-side id.
        id: String,
    },
    /// `submit_attachment` was called.
    Attach {
        /// Device template id (the batch primary key).
        template_id: String,
        /// Number of device entries in the request.
        devices: usize,
    },
    /// `submit_detach` was called.
    Detach {
        /// Device template id.
        template_id: String,
        /// Detached device ids.
        devices: Vec<String>,
    },
    /// `activate_policy` was called.
    Activate {
        /// Policy id.
        policy_id: String,
    },
}

#[derive(Default)]
struct MemoryState {
    items: BTreeMap<String, Vec<Item>>,
    attachments: BTreeMap<String, Vec<Value>>,
    writes: Vec<WriteRecord>,
    reattach_signals: BTreeMap<(String, String), Vec<String>>,
    reactivate_signals: BTreeMap<(String, String), bool>,
    action_scripts: VecDeque<Vec<ActionStatus>>,
    action_states: BTreeMap<String, VecDeque<ActionStatus>>,
    next_action: u64,
    polls: BTreeMap<String, u64>,
}

/// An in-memory target for tests.
///
/// Behaves like a small backend: items live in per-category vectors, ids
/// are fresh UUIDs assigned on create, actions succeed immediately unless
/// a script says otherwise. Every mutating call is recorded.
pub struct MemoryTarget {
    catalog: Catalog,
    echo_create_id: bool,
    state: Mutex<MemoryState>,
}

impl MemoryTarget {
    /// Creates an empty target using the built-in catalog.
    pub fn new() -> Self {
        Self {
            catalog: Catalog::builtin(),
            echo_create_id: true,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Makes create responses omit the assigned id, forcing callers onto
    /// the re-read-the-index reconciliation path.
    pub fn without_create_id_echo(mut self) -> Self {
        self.echo_create_id = false;
        self
    }

    /// Seeds an item as already existing on the target.
    pub fn seed(&self, item: Item) {
        self.state
            .lock()
            .items
            .entry(item.category.clone())
            .or_default()
            .push(item);
    }

    /// Seeds the attachment records of a device template.
    pub fn seed_attachments(&self, template_id: impl Into<String>, devices: Vec<Value>) {
        self.state
            .lock()
            .attachments
            .insert(template_id.into(), devices);
    }

    /// Scripts a reattach signal for the next write of `(category, name)`.
    pub fn script_reattach(
        &self,
        category: impl Into<String>,
        name: impl Into<String>,
        affected: Vec<String>,
    ) {
        self.state
            .lock()
            .reattach_signals
            .insert((category.into(), name.into()), affected);
    }

    /// Scripts a reactivate signal for the next write of `(category, name)`.
    pub fn script_reactivate(&self, category: impl Into<String>, name: impl Into<String>) {
        self.state
            .lock()
            .reactivate_signals
            .insert((category.into(), name.into()), true);
    }

    /// Scripts the status sequence of the next submitted action. The last
    /// status repeats once the sequence is exhausted.
    pub fn script_action(&self, statuses: Vec<ActionStatus>) {
        self.state.lock().action_scripts.push_back(statuses);
    }

    /// Mutating calls recorded so far, in order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    /// Number of mutating calls recorded so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    /// Number of status polls one action has received.
    pub fn polls_for(&self, action_id: &str) -> u64 {
        self.state
            .lock()
            .polls
            .get(action_id)
            .copied()
            .unwrap_or(0)
    }

    /// All items currently stored in one category.
    pub fn items_in(&self, category: &str) -> Vec<Item> {
        self.state
            .lock()
            .items
            .get(category)
            .cloned()
            .unwrap_or_default()
    }

    fn fields_for(&self, category: &str) -> (&'static str, &'static str) {
        self.catalog
            .descriptor(category)
            .map(|d| (d.id_field, d.name_field))
            .unwrap_or(("id", "name"))
    }

    fn new_action(state: &mut MemoryState) -> ActionHandle {
        state.next_action += 1;
        let id = format!("action-{}", state.next_action);
        let script = state
            .action_scripts
            .pop_front()
            .unwrap_or_else(|| vec![ActionStatus::Success]);
        state.action_states.insert(id.clone(), script.into());
        ActionHandle { id }
    }
}

impl Default for MemoryTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl Target for MemoryTarget {
    fn index(&self, category: &str) -> EngineResult<Option<Index>> {
        let state = self.state.lock();
        Ok(state.items.get(category).map(|items| {
            Index::from_pairs(
                items
                    .iter()
                    .map(|item| (item.id.clone(), item.name.clone())),
            )
        }))
    }

    fn item(&self, category: &str, id: &str, name: &str) -> EngineResult<Option<Item>> {
        let state = self.state.lock();
        Ok(state.items.get(category).and_then(|items| {
            items
                .iter()
                .find(|item| item.id == id || item.name == name)
                .cloned()
        }))
    }

    fn create_item(&self, category: &str, payload: &Value) -> EngineResult<WriteResponse> {
        let (id_field, name_field) = self.fields_for(category);
        let mut state = self.state.lock();

        let new_id = uuid::Uuid::new_v4().to_string();
        let name = payload
            .get(name_field)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let mut stored = payload.clone();
        if let Some(obj) = stored.as_object_mut() {
            obj.insert(id_field.to_string(), Value::String(new_id.clone()));
        }

        state.writes.push(WriteRecord::Create {
            category: category.to_string(),
            name: name.clone(),
            payload: payload.clone(),
        });
        state
            .items
            .entry(category.to_string())
            .or_default()
            .push(Item::new(new_id.clone(), name.clone(), category, stored));

        let key = (category.to_string(), name);
        let needs_reattach = state.reattach_signals.remove(&key).unwrap_or_default();
        let needs_reactivate = state.reactivate_signals.remove(&key).unwrap_or(false);

        Ok(WriteResponse {
            id: self.echo_create_id.then_some(new_id),
            needs_reattach,
            needs_reactivate,
        })
    }

    fn update_item(
        &self,
        category: &str,
        id: &str,
        payload: &Value,
    ) -> EngineResult<WriteResponse> {
        let (_, name_field) = self.fields_for(category);
        let mut state = self.state.lock();

        state.writes.push(WriteRecord::Update {
            category: category.to_string(),
            id: id.to_string(),
            payload: payload.clone(),
        });

        let mut name = String::new();
        if let Some(items) = state.items.get_mut(category) {
            if let Some(existing) = items.iter_mut().find(|item| item.id == id) {
                name = existing.name.clone();
                existing.payload = payload.clone();
            }
        }
        if name.is_empty() {
            name = payload
                .get(name_field)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
        }

        let key = (category.to_string(), name);
        let needs_reattach = state.reattach_signals.remove(&key).unwrap_or_default();
        let needs_reactivate = state.reactivate_signals.remove(&key).unwrap_or(false);

        Ok(WriteResponse {
            id: Some(id.to_string()),
            needs_reattach,
            needs_reactivate,
        })
    }

    fn delete_item(&self, category: &str, id: &str) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.writes.push(WriteRecord::Delete {
            category: category.to_string(),
            id: id.to_string(),
        });
        if let Some(items) = state.items.get_mut(category) {
            items.retain(|item| item.id != id);
        }
        Ok(())
    }

    fn attached_devices(&self, template_id: &str) -> EngineResult<Vec<Value>> {
        Ok(self
            .state
            .lock()
            .attachments
            .get(template_id)
            .cloned()
            .unwrap_or_default())
    }

    fn submit_attachment(&self, request: &BatchRequest) -> EngineResult<ActionHandle> {
        let mut state = self.state.lock();
        state.writes.push(WriteRecord::Attach {
            template_id: request.primary_key.clone(),
            devices: request.entries.len(),
        });
        Ok(Self::new_action(&mut state))
    }

    fn submit_detach(
        &self,
        template_id: &str,
        device_ids: &[String],
    ) -> EngineResult<ActionHandle> {
        let mut state = self.state.lock();
        state.writes.push(WriteRecord::Detach {
            template_id: template_id.to_string(),
            devices: device_ids.to_vec(),
        });
        Ok(Self::new_action(&mut state))
    }

    fn activate_policy(&self, policy_id: &str) -> EngineResult<ActionHandle> {
        let mut state = self.state.lock();
        state.writes.push(WriteRecord::Activate {
            policy_id: policy_id.to_string(),
        });
        Ok(Self::new_action(&mut state))
    }

    fn action_status(&self, action_id: &str) -> EngineResult<ActionStatus> {
        let mut state = self.state.lock();
        *state.polls.entry(action_id.to_string()).or_insert(0) += 1;

        let Some(script) = state.action_states.get_mut(action_id) else {
            return Ok(ActionStatus::Failure(format!(
                "unknown action {action_id}"
            )));
        };

        if script.len() > 1 {
            Ok(script.pop_front().unwrap_or(ActionStatus::Success))
        } else {
            Ok(script
                .front()
                .cloned()
                .unwrap_or(ActionStatus::Success))
        }
    }
}

/// An in-memory configuration source for tests.
#[derive(Default)]
pub struct MemorySource {
    items: BTreeMap<String, Vec<Item>>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item; the index for its category is derived automatically.
    pub fn add(&mut self, item: Item) {
        self.items.entry(item.category.clone()).or_default().push(item);
    }
}

impl ConfigSource for MemorySource {
    fn load_index(&self, category: &str) -> CoreResult<Option<Index>> {
        Ok(self.items.get(category).map(|items| {
            Index::from_pairs(
                items
                    .iter()
                    .map(|item| (item.id.clone(), item.name.clone())),
            )
        }))
    }

    fn load_item(&self, category: &str, id: &str, _name: &str) -> CoreResult<Option<Item>> {
        Ok(self
            .items
            .get(category)
            .and_then(|items| items.iter().find(|item| item.id == id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_assigns_fresh_id() {
        let target = MemoryTarget::new();
        let response = target
            .create_item(
                "policy_list_site",
                &json!({"name": "corp-sites", "entries": []}),
            )
            .unwrap();

        let id = response.id.unwrap();
        let index = target.index("policy_list_site").unwrap().unwrap();
        assert_eq!(index.id_for_name("corp-sites"), Some(id.as_str()));
    }

    #[test]
    fn create_without_id_echo() {
        let target = MemoryTarget::new().without_create_id_echo();
        let response = target
            .create_item("policy_list_site", &json!({"name": "corp-sites"}))
            .unwrap();

        assert!(response.id.is_none());
        // The item exists regardless; only the echo is suppressed.
        assert_eq!(target.items_in("policy_list_site").len(), 1);
    }

    #[test]
    fn scripted_write_signals_fire_once() {
        let target = MemoryTarget::new();
        target.seed(Item::new(
            "t1",
            "branch",
            "template_device",
            json!({"templateId": "t1", "templateName": "branch"}),
        ));
        target.script_reattach("template_device", "branch", vec!["t1".into()]);

        let response = target
            .update_item("template_device", "t1", &json!({"templateName": "branch"}))
            .unwrap();
        assert_eq!(response.needs_reattach, vec!["t1".to_string()]);

        let response = target
            .update_item("template_device", "t1", &json!({"templateName": "branch"}))
            .unwrap();
        assert!(response.needs_reattach.is_empty());
    }

    #[test]
    fn scripted_action_sequence() {
        let target = MemoryTarget::new();
        target.script_action(vec![ActionStatus::InProgress, ActionStatus::Success]);

        let handle = target.submit_attachment(&BatchRequest {
            primary_key: "t1".into(),
            entries: vec![("dev-1".into(), json!({}))],
        }).unwrap();

        assert_eq!(
            target.action_status(&handle.id).unwrap(),
            ActionStatus::InProgress
        );
        assert_eq!(
            target.action_status(&handle.id).unwrap(),
            ActionStatus::Success
        );
        // Terminal status repeats.
        assert_eq!(
            target.action_status(&handle.id).unwrap(),
            ActionStatus::Success
        );
        assert_eq!(target.polls_for(&handle.id), 3);
    }

    #[test]
    fn delete_removes_item() {
        let target = MemoryTarget::new();
        target.seed(Item::new(
            "l1",
            "corp",
            "policy_list_site",
            json!({"listId": "l1", "name": "corp"}),
        ));

        target.delete_item("policy_list_site", "l1").unwrap();
        assert!(target.items_in("policy_list_site").is_empty());
        assert_eq!(target.write_count(), 1);
    }
}
