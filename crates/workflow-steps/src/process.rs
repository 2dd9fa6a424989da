//! Process definition and instance steps

use crate::{require_fields, required_field, text_of};
use probe_core::{endpoints, AssertionFailure, Authorization, Context, HarnessError, ResourceKind, Result};
use serde_json::{json, Value};
use step_registry::{StepArgs, StepFuture, StepRegistry};
use tracing::{debug, info};

const VALID_BPMN: &str = "<bpmn>...</bpmn>";

pub(crate) fn register(registry: &mut StepRegistry<Context>) -> Result<()> {
    registry
        .step("the API base URL is {string}", api_base_url)?
        .step("valid authentication credentials are provided", valid_credentials)?
        .step("a valid process definition request", valid_definition_request)?
        .step(
            "a process definition request with invalid BPMN XML",
            invalid_definition_request,
        )?
        .step("an existing process definition", existing_definition)?
        .step("a non-existent process definition ID", nonexistent_definition)?
        .step("an existing process definition with versions", definition_with_versions)?
        .step("an existing process definition version", existing_definition_version)?
        .step(
            "an existing inactive process definition version",
            inactive_definition_version,
        )?
        .step("an active process definition", active_definition)?
        .step("an existing process instance", existing_instance)?
        .step("an existing process instance with tasks", instance_with_tasks)?
        .step("an existing incomplete process task", incomplete_task)?
        .step("POST request is made to {string}", post_request_body)?
        .step("GET request is made to {string}", get_request)?
        .step(
            "POST request is made to {string} with definition ID",
            post_definition_id,
        )?
        .step(
            "I create a new process version for definition {string}",
            create_process_version,
        )?
        .step(
            "response should contain process definition details",
            contains_definition_details,
        )?
        .step("response should match the stored definition", matches_stored_definition)?
        .step("response should contain paginated versions", contains_paginated_versions)?
        .step("response should match the version details", matches_version_details)?
        .step("response should contain instance details", contains_instance_details)?
        .step("response should contain instance status", contains_instance_status)?
        .step("response should contain task list", contains_task_list)?;
    Ok(())
}

fn definition_request(name: &str, key: &str, bpmn_xml: &str) -> Value {
    json!({
        "name": name,
        "key": key,
        "bpmnXml": bpmn_xml,
        "businessOwnerId": 1
    })
}

/// Absolute URLs replace the API root; paths are taken relative to the base URL.
fn api_base_url(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let url = args.str(0)?.trim_end_matches('/');
        ctx.api_root = if url.starts_with('/') {
            format!("{}{url}", ctx.base_url())
        } else {
            url.to_string()
        };
        debug!(api_root = %ctx.api_root, "API root set");
        Ok(())
    })
}

fn valid_credentials(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let token = Context::require("api_token", &ctx.api_token)?.to_string();
        ctx.session.authorize(Authorization::Bearer(token));
        Ok(())
    })
}

fn valid_definition_request(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.request_body = Some(definition_request("Test Process", "test_process", VALID_BPMN));
        Ok(())
    })
}

fn invalid_definition_request(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.request_body = Some(definition_request("Invalid Process", "invalid_process", "invalid"));
        Ok(())
    })
}

fn use_definition(ctx: &mut Context, definition_id: &str, version_id: Option<&str>) {
    ctx.definition_id = Some(definition_id.to_string());
    if let Some(version_id) = version_id {
        ctx.version_id = Some(version_id.to_string());
    }
}

fn existing_definition(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        use_definition(ctx, "test_definition", None);
        Ok(())
    })
}

fn nonexistent_definition(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        use_definition(ctx, "nonexistent", None);
        Ok(())
    })
}

fn definition_with_versions(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        use_definition(ctx, "versioned_definition", None);
        Ok(())
    })
}

fn existing_definition_version(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        use_definition(ctx, "versioned_definition", Some("v1"));
        Ok(())
    })
}

fn inactive_definition_version(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        use_definition(ctx, "inactive_definition", Some("v1"));
        Ok(())
    })
}

fn active_definition(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        use_definition(ctx, "active_definition", None);
        Ok(())
    })
}

fn existing_instance(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.instance_id = Some("test_instance".to_string());
        Ok(())
    })
}

fn instance_with_tasks(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.instance_id = Some("task_instance".to_string());
        Ok(())
    })
}

fn incomplete_task(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.instance_id = Some("task_instance".to_string());
        ctx.task_id = Some("incomplete_task".to_string());
        Ok(())
    })
}

fn post_request_body(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let body = ctx
            .request_body
            .clone()
            .ok_or(HarnessError::MissingValue { slot: "request_body" })?;
        let url = ctx.endpoint_url(args.str(0)?);
        let response = ctx.session.post_json(&url, &body).await?;
        ctx.remember(response);
        Ok(())
    })
}

fn get_request(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let url = ctx.endpoint_url(args.str(0)?);
        let response = ctx.session.get(&url).await?;
        ctx.remember(response);
        Ok(())
    })
}

fn post_definition_id(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let definition_id = Context::require("definition_id", &ctx.definition_id)?;
        let body = json!({ "definitionId": definition_id });
        let url = ctx.endpoint_url(args.str(0)?);
        let response = ctx.session.post_json(&url, &body).await?;
        ctx.remember(response);
        Ok(())
    })
}

/// Posts a draft BPMN version; a 201 is ledgered under the returned version id.
fn create_process_version(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let definition_id = args.string(0)?;
        let url = ctx.api_url(&endpoints::process_versions(&definition_id));
        let response = ctx.session.post_json(&url, &json!({ "bpmnXml": VALID_BPMN })).await?;

        if response.status_code() == 201 {
            let version_id = response
                .field_text("id")
                .ok_or_else(|| AssertionFailure::new(format!("created version has no `id`: {}", response.text)))?;
            ctx.track_if_created(&response, ResourceKind::ProcessVersion, &definition_id, &version_id);
            info!(definition = %definition_id, version = %version_id, "Process version created");
            ctx.version_id = Some(version_id);
        }
        ctx.definition_id = Some(definition_id);
        ctx.remember(response);
        Ok(())
    })
}

fn contains_definition_details(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move { require_fields(ctx, &["id", "name", "key", "bpmnXml"]) })
}

fn matches_stored_definition(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let name = text_of(required_field(ctx, "name")?);
        AssertionFailure::ensure(name == "Test Process", || {
            format!("definition name: expected Test Process, got {name}")
        })?;
        Ok(())
    })
}

fn contains_paginated_versions(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let content = required_field(ctx, "content")?
            .as_array()
            .ok_or_else(|| AssertionFailure::new("`content` is not an array"))?;
        AssertionFailure::ensure(content.len() == 1, || {
            format!("paginated versions: expected 1, got {}", content.len())
        })?;
        Ok(())
    })
}

fn matches_version_details(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let version = text_of(required_field(ctx, "version")?);
        AssertionFailure::ensure(version == "1.0", || {
            format!("process version: expected 1.0, got {version}")
        })?;
        Ok(())
    })
}

fn contains_instance_details(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move { require_fields(ctx, &["instanceId", "definitionId"]) })
}

fn contains_instance_status(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move { require_fields(ctx, &["status", "startTime"]) })
}

fn contains_task_list(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let response = ctx.response()?;
        let tasks = response
            .body
            .as_array()
            .ok_or_else(|| AssertionFailure::new(format!("task list is not an array: {}", response.text)))?;
        AssertionFailure::ensure(tasks.len() == 1, || {
            format!("task list: expected 1 task, got {}", tasks.len())
        })?;
        AssertionFailure::ensure(tasks[0].get("taskId").is_some(), || {
            "task has no `taskId`".to_string()
        })?;
        Ok(())
    })
}
