use crate::state::{ProcessDefinition, ProcessInstance, ProcessVersion, StubState, Task, VersionStatus};
use crate::{respond, ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

const PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDefinition {
    name: Option<String>,
    key: Option<String>,
    bpmn_xml: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersion {
    version: Option<String>,
    bpmn_xml: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInstance {
    definition_id: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

/// Accepts anything shaped like a single XML document.
fn validate_bpmn(xml: &str) -> Result<(), ApiError> {
    let xml = xml.trim();
    if xml.starts_with('<') && xml.ends_with('>') {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid BPMN XML"))
    }
}

fn definition_not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("Process definition not found: {id}"))
}

fn version_details(definition: &ProcessDefinition, version: &ProcessVersion) -> Value {
    json!({
        "id": version.id,
        "definitionId": definition.id,
        "name": definition.name,
        "key": definition.key,
        "version": version.version,
        "status": version.status,
        "bpmnXml": version.bpmn_xml,
    })
}

#[instrument(skip(state))]
pub async fn create_definition(
    State(state): State<Arc<StubState>>,
    Json(payload): Json<CreateDefinition>,
) -> ApiResult {
    let name = required(payload.name, "name")?;
    let key = required(payload.key, "key")?;
    let bpmn_xml = required(payload.bpmn_xml, "bpmnXml")?;
    validate_bpmn(&bpmn_xml)?;

    let definition = ProcessDefinition {
        id: format!("def-{}", state.next_id()),
        name,
        key,
        bpmn_xml,
        versions: Vec::new(),
    };
    state.definitions.insert(definition.id.clone(), definition.clone());
    info!(id = %definition.id, "Process definition created");
    respond(StatusCode::OK, definition)
}

#[instrument(skip(state))]
pub async fn list_definitions(State(state): State<Arc<StubState>>) -> ApiResult {
    let mut definitions: Vec<ProcessDefinition> =
        state.definitions.iter().map(|e| e.value().clone()).collect();
    definitions.sort_by(|a, b| a.id.cmp(&b.id));
    respond(StatusCode::OK, definitions)
}

#[instrument(skip(state))]
pub async fn get_definition(State(state): State<Arc<StubState>>, Path(id): Path<String>) -> ApiResult {
    let definition = state
        .definitions
        .get(&id)
        .map(|d| d.value().clone())
        .ok_or_else(|| definition_not_found(&id))?;
    respond(StatusCode::OK, definition)
}

/// First page of a definition's versions, newest first.
#[instrument(skip(state))]
pub async fn list_versions(State(state): State<Arc<StubState>>, Path(id): Path<String>) -> ApiResult {
    let definition = state.definitions.get(&id).ok_or_else(|| definition_not_found(&id))?;
    let total = definition.versions.len();
    let content: Vec<Value> = definition
        .versions
        .iter()
        .rev()
        .take(PAGE_SIZE)
        .map(|v| version_details(&definition, v))
        .collect();

    respond(
        StatusCode::OK,
        json!({
            "content": content,
            "totalElements": total,
            "totalPages": total.div_ceil(PAGE_SIZE),
            "number": 0,
            "size": PAGE_SIZE,
        }),
    )
}

#[instrument(skip(state))]
pub async fn get_version(
    State(state): State<Arc<StubState>>,
    Path((id, version)): Path<(String, String)>,
) -> ApiResult {
    let mut definition = state.definitions.get_mut(&id).ok_or_else(|| definition_not_found(&id))?;
    let found = definition
        .version_mut(&version)
        .map(|v| v.clone())
        .ok_or_else(|| ApiError::not_found(format!("Version {version} not found for definition: {id}")))?;
    respond(StatusCode::OK, version_details(&definition, &found))
}

/// Adds a draft version; the label defaults to the next free `N.0`.
#[instrument(skip(state))]
pub async fn create_version(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
    Json(payload): Json<CreateVersion>,
) -> ApiResult {
    let mut definition = state.definitions.get_mut(&id).ok_or_else(|| definition_not_found(&id))?;
    let bpmn_xml = payload.bpmn_xml.unwrap_or_else(|| definition.bpmn_xml.clone());
    validate_bpmn(&bpmn_xml)?;

    let label = match payload.version.filter(|v| !v.trim().is_empty()) {
        Some(label) if definition.versions.iter().any(|v| v.version == label) => {
            return Err(ApiError::bad_request(format!(
                "Version {label} already exists for definition: {id}"
            )));
        }
        Some(label) => label,
        None => {
            let mut n = definition.versions.len() + 1;
            while definition.versions.iter().any(|v| v.version == format!("{n}.0")) {
                n += 1;
            }
            format!("{n}.0")
        }
    };

    let version = ProcessVersion {
        id: format!("v{}", definition.versions.len() + 1),
        version: label,
        status: VersionStatus::Draft,
        bpmn_xml,
    };
    definition.versions.push(version.clone());
    info!(definition = %id, version = %version.id, "Process version created");
    respond(StatusCode::CREATED, version_details(&definition, &version))
}

fn set_status(state: &StubState, id: &str, version: &str, status: VersionStatus) -> ApiResult {
    let mut definition = state.definitions.get_mut(id).ok_or_else(|| definition_not_found(id))?;
    let target = definition
        .version_mut(version)
        .ok_or_else(|| ApiError::not_found(format!("Version {version} not found for definition: {id}")))?;
    target.status = status;
    let updated = target.clone();
    respond(StatusCode::OK, version_details(&definition, &updated))
}

#[instrument(skip(state))]
pub async fn activate_version(
    State(state): State<Arc<StubState>>,
    Path((id, version)): Path<(String, String)>,
) -> ApiResult {
    let response = set_status(&state, &id, &version, VersionStatus::Active)?;
    info!(definition = %id, version = %version, "Process version activated");
    Ok(response)
}

#[instrument(skip(state))]
pub async fn undeploy_version(
    State(state): State<Arc<StubState>>,
    Path((id, version)): Path<(String, String)>,
) -> ApiResult {
    state.record_undeployment(&id, &version);
    let response = set_status(&state, &id, &version, VersionStatus::Inactive)?;
    info!(definition = %id, version = %version, "Process version undeployed");
    Ok(response)
}

/// Starts an instance of a definition that has an active version.
#[instrument(skip(state))]
pub async fn start_instance(
    State(state): State<Arc<StubState>>,
    Json(payload): Json<StartInstance>,
) -> ApiResult {
    let definition_id = required(payload.definition_id, "definitionId")?;
    let active = state
        .definitions
        .get(&definition_id)
        .map(|d| d.has_active_version())
        .ok_or_else(|| definition_not_found(&definition_id))?;
    if !active {
        return Err(ApiError::bad_request(format!(
            "Process definition has no active version: {definition_id}"
        )));
    }

    let n = state.next_id();
    let instance = ProcessInstance {
        instance_id: format!("inst-{n}"),
        definition_id,
        status: "ACTIVE".to_string(),
        start_time: Utc::now().to_rfc3339(),
        tasks: vec![Task {
            task_id: format!("task-{n}"),
            name: "Review request".to_string(),
            status: "INCOMPLETE".to_string(),
        }],
    };
    state
        .instances
        .insert(instance.instance_id.clone(), instance.clone());
    info!(instance = %instance.instance_id, "Process instance started");
    respond(StatusCode::OK, instance)
}

fn instance_not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("Process instance not found: {id}"))
}

#[instrument(skip(state))]
pub async fn get_instance(State(state): State<Arc<StubState>>, Path(id): Path<String>) -> ApiResult {
    let instance = state
        .instances
        .get(&id)
        .map(|i| i.value().clone())
        .ok_or_else(|| instance_not_found(&id))?;
    respond(StatusCode::OK, instance)
}

#[instrument(skip(state))]
pub async fn list_tasks(State(state): State<Arc<StubState>>, Path(id): Path<String>) -> ApiResult {
    let tasks = state
        .instances
        .get(&id)
        .map(|i| i.tasks.clone())
        .ok_or_else(|| instance_not_found(&id))?;
    respond(StatusCode::OK, tasks)
}
