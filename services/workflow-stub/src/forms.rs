use crate::state::{Form, FormVersion, StubState};
use crate::{respond, ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Deserialize)]
pub struct CreateForm {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    definition: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormVersion {
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    definition: Option<Value>,
    published_date: Option<i64>,
}

#[instrument(skip(state))]
pub async fn create_form(State(state): State<Arc<StubState>>, Json(payload): Json<CreateForm>) -> ApiResult {
    let name = payload
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Form name is required"))?;

    let form = Form {
        id: state.next_form_id(),
        name,
        version: payload.version.unwrap_or_else(|| "1.0".to_string()),
        definition: payload.definition,
    };
    state.forms.insert(form.id, form.clone());
    info!(id = form.id, "Form created");
    respond(StatusCode::CREATED, form)
}

#[instrument(skip(state))]
pub async fn get_form(State(state): State<Arc<StubState>>, Path(id): Path<String>) -> ApiResult {
    let form = id
        .parse::<u64>()
        .ok()
        .and_then(|id| state.forms.get(&id).map(|f| f.value().clone()))
        .ok_or_else(|| ApiError::not_found(format!("Form not found: {id}")))?;
    respond(StatusCode::OK, form)
}

#[instrument(skip(state))]
pub async fn list_form_keys(State(state): State<Arc<StubState>>) -> ApiResult {
    let mut keys: Vec<String> = state.form_versions.iter().map(|e| e.key().clone()).collect();
    keys.sort();
    respond(StatusCode::OK, keys)
}

#[instrument(skip(state))]
pub async fn create_version(
    State(state): State<Arc<StubState>>,
    Path(key): Path<String>,
    Json(payload): Json<CreateFormVersion>,
) -> ApiResult {
    let version = payload
        .version
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Version is required"))?;
    let definition = payload
        .definition
        .ok_or_else(|| ApiError::bad_request("Definition is required"))?;

    let mut versions = state.form_versions.entry(key.clone()).or_default();
    if versions.iter().any(|v| v.version == version) {
        warn!(key = %key, version = %version, "Duplicate form version rejected");
        return Err(ApiError::bad_request(format!("Version already exists for form: {key}")));
    }

    let created = FormVersion {
        id: state.next_id(),
        key: key.clone(),
        name: payload.name.unwrap_or_else(|| key.clone()),
        description: payload.description,
        version,
        definition,
        published_date: payload
            .published_date
            .unwrap_or_else(|| Utc::now().timestamp_millis()),
        deprecated: false,
    };
    versions.push(created.clone());
    info!(key = %key, version = %created.version, "Form version created");
    respond(StatusCode::CREATED, created)
}

/// Every version of a form, most recently published first.
#[instrument(skip(state))]
pub async fn list_versions(State(state): State<Arc<StubState>>, Path(key): Path<String>) -> ApiResult {
    let mut versions = state
        .form_versions
        .get(&key)
        .map(|v| v.value().clone())
        .unwrap_or_default();
    versions.sort_by(|a, b| b.published_date.cmp(&a.published_date));
    respond(StatusCode::OK, versions)
}

/// The version with the greatest publish date, regardless of creation order.
#[instrument(skip(state))]
pub async fn latest_version(State(state): State<Arc<StubState>>, Path(key): Path<String>) -> ApiResult {
    let latest = state
        .form_versions
        .get(&key)
        .and_then(|versions| versions.iter().max_by_key(|v| v.published_date).cloned())
        .ok_or_else(|| ApiError::not_found(format!("No versions found for form: {key}")))?;
    respond(StatusCode::OK, latest)
}

#[instrument(skip(state))]
pub async fn get_version(
    State(state): State<Arc<StubState>>,
    Path((key, version)): Path<(String, String)>,
) -> ApiResult {
    let found = state
        .form_version(&key, &version)
        .ok_or_else(|| ApiError::not_found(format!("Version {version} not found for form: {key}")))?;
    respond(StatusCode::OK, found)
}

/// Idempotent: deprecating an already deprecated version succeeds again.
#[instrument(skip(state))]
pub async fn deprecate_version(
    State(state): State<Arc<StubState>>,
    Path((key, version)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.record_deprecation(&key, &version);
    if state.deprecation_fails(&key, &version) {
        warn!(key = %key, version = %version, "Injected deprecation failure");
        return Err(ApiError::internal(format!("Deprecation failed for form: {key}")));
    }

    let mut versions = state
        .form_versions
        .get_mut(&key)
        .ok_or_else(|| ApiError::not_found(format!("No versions found for form: {key}")))?;
    let target = versions
        .iter_mut()
        .find(|v| v.version == version)
        .ok_or_else(|| ApiError::not_found(format!("Version {version} not found for form: {key}")))?;
    target.deprecated = true;
    info!(key = %key, version = %version, "Form version deprecated");
    Ok(StatusCode::NO_CONTENT)
}
