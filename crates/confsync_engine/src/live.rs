//! Live-target adapter over the REST transport.
//!
//! This is the only place the engine's abstract write protocol meets the
//! backend's concrete wire shapes: which endpoint a category lives on,
//! which response field carries the echoed id, and how write signals and
//! action statuses are spelled. Changing the wire contract is a change to
//! this file only.

use crate::batch::BatchRequest;
use crate::error::{EngineError, EngineResult};
use crate::target::{ActionHandle, ActionStatus, Target, WriteResponse};
use confsync_catalog::{Catalog, CategoryDescriptor};
use confsync_core::{ConfigSource, CoreError, CoreResult, Index, Item};
use confsync_transport::{RestClient, TransportError};
use serde_json::{json, Value};
use tracing::debug;

const ATTACHED_PATH: &str = "template/device/config/attached";
const ATTACH_PATH: &str = "template/device/config/attachfeature";
const DETACH_PATH: &str = "template/device/config/detach";
const ACTIVATE_PATH: &str = "template/policy/vsmart/activate";
const ACTION_STATUS_PATH: &str = "device/action/status";

/// The managed system reached through the REST transport.
pub struct LiveTarget<'a> {
    client: &'a dyn RestClient,
    catalog: &'a Catalog,
}

impl<'a> LiveTarget<'a> {
    /// Creates an adapter over `client` using `catalog` for paths and
    /// field names.
    pub fn new(client: &'a dyn RestClient, catalog: &'a Catalog) -> Self {
        Self { client, catalog }
    }

    fn descriptor(&self, category: &str) -> EngineResult<&CategoryDescriptor> {
        self.catalog
            .descriptor(category)
            .ok_or_else(|| EngineError::UnknownCategory(category.to_string()))
    }

    fn parse_write(response: Option<Value>, id_field: &str) -> WriteResponse {
        let Some(response) = response else {
            return WriteResponse::default();
        };

        let id = response
            .get(id_field)
            .or_else(|| response.get("id"))
            .and_then(Value::as_str)
            .map(String::from);

        let needs_reattach = response
            .get("affectedAttachments")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let needs_reactivate = response
            .get("requiresReactivation")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        WriteResponse {
            id,
            needs_reattach,
            needs_reactivate,
        }
    }

    fn parse_action(path: &str, response: Option<Value>) -> EngineResult<ActionHandle> {
        response
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .map(|id| ActionHandle { id: id.to_string() })
            .ok_or_else(|| EngineError::unexpected_response(path, "missing action id"))
    }

    fn data_array(response: Value) -> Vec<Value> {
        match response.get("data") {
            Some(Value::Array(entries)) => entries.clone(),
            _ => Vec::new(),
        }
    }
}

impl Target for LiveTarget<'_> {
    fn index(&self, category: &str) -> EngineResult<Option<Index>> {
        let descriptor = self.descriptor(category)?;
        let paths = descriptor.paths.index();

        let response = self.client.get(paths.index, &[])?;
        let mut index = Index::new();
        for entry in Self::data_array(response) {
            let id = entry.get(descriptor.id_field).and_then(Value::as_str);
            let name = entry.get(descriptor.name_field).and_then(Value::as_str);
            match (id, name) {
                (Some(id), Some(name)) => index.push(id, name),
                _ => debug!(category, "index entry without id/name skipped"),
            }
        }
        Ok(Some(index))
    }

    fn item(&self, category: &str, id: &str, _name: &str) -> EngineResult<Option<Item>> {
        let descriptor = self.descriptor(category)?;
        let paths = descriptor.paths.index();

        let path = format!("{}/{}", paths.object, id);
        let payload = match self.client.get(&path, &[]) {
            Ok(payload) => payload,
            // The backend answers a missing item with 404; that is absence,
            // not an error.
            Err(TransportError::Fatal { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if payload.is_null() {
            return Ok(None);
        }

        let item = Item::from_payload(
            descriptor.category,
            descriptor.id_field,
            descriptor.name_field,
            payload,
        )?;
        Ok(Some(item))
    }

    fn create_item(&self, category: &str, payload: &Value) -> EngineResult<WriteResponse> {
        let descriptor = self.descriptor(category)?;
        let paths = descriptor.paths.resolve(payload);

        let response = self.client.post(paths.object, payload)?;
        Ok(Self::parse_write(response, descriptor.id_field))
    }

    fn update_item(
        &self,
        category: &str,
        id: &str,
        payload: &Value,
    ) -> EngineResult<WriteResponse> {
        let descriptor = self.descriptor(category)?;
        let paths = descriptor.paths.resolve(payload);

        let response = self.client.put(paths.object, id, payload)?;
        Ok(Self::parse_write(response, descriptor.id_field))
    }

    fn delete_item(&self, category: &str, id: &str) -> EngineResult<()> {
        let descriptor = self.descriptor(category)?;
        let paths = descriptor.paths.index();

        self.client.delete(paths.object, id)?;
        Ok(())
    }

    fn attached_devices(&self, template_id: &str) -> EngineResult<Vec<Value>> {
        let path = format!("{ATTACHED_PATH}/{template_id}");
        let response = self.client.get(&path, &[])?;
        Ok(Self::data_array(response))
    }

    fn submit_attachment(&self, request: &BatchRequest) -> EngineResult<ActionHandle> {
        let devices: Vec<&Value> = request.entries.iter().map(|(_, values)| values).collect();
        let body = json!({
            "deviceTemplateList": [{
                "templateId": request.primary_key,
                "device": devices,
            }],
        });

        let response = self.client.post(ATTACH_PATH, &body)?;
        Self::parse_action(ATTACH_PATH, response)
    }

    fn submit_detach(
        &self,
        template_id: &str,
        device_ids: &[String],
    ) -> EngineResult<ActionHandle> {
        let devices: Vec<Value> = device_ids.iter().map(|id| json!({"uuid": id})).collect();
        let body = json!({
            "templateId": template_id,
            "devices": devices,
        });

        let response = self.client.post(DETACH_PATH, &body)?;
        Self::parse_action(DETACH_PATH, response)
    }

    fn activate_policy(&self, policy_id: &str) -> EngineResult<ActionHandle> {
        let path = format!("{ACTIVATE_PATH}/{policy_id}");
        let response = self.client.post(&path, &json!({}))?;
        Self::parse_action(&path, response)
    }

    fn action_status(&self, action_id: &str) -> EngineResult<ActionStatus> {
        let path = format!("{ACTION_STATUS_PATH}/{action_id}");
        let response = self.client.get(&path, &[])?;

        let summary = response.get("summary").unwrap_or(&Value::Null);
        let status = summary.get("status").and_then(Value::as_str).unwrap_or("");

        Ok(match status {
            "done" => {
                let status_id = summary.get("statusId").and_then(Value::as_str);
                if status_id == Some("failure") {
                    let detail = summary
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("action reported failure")
                        .to_string();
                    ActionStatus::Failure(detail)
                } else {
                    ActionStatus::Success
                }
            }
            "failure" => ActionStatus::Failure(
                summary
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("action reported failure")
                    .to_string(),
            ),
            _ => ActionStatus::InProgress,
        })
    }
}

impl ConfigSource for LiveTarget<'_> {
    fn load_index(&self, category: &str) -> CoreResult<Option<Index>> {
        self.index(category)
            .map_err(|e| CoreError::backend(e.to_string()))
    }

    fn load_item(&self, category: &str, id: &str, name: &str) -> CoreResult<Option<Item>> {
        self.item(category, id, name)
            .map_err(|e| CoreError::backend(e.to_string()))
    }
}
