//! Form version steps: create, fetch, deprecate

use crate::{required_field, text_of};
use probe_core::{endpoints, ApiResponse, AssertionFailure, Context, HarnessError, ResourceKind, Result};
use serde_json::{json, Value};
use step_registry::{StepArgs, StepFuture, StepRegistry};
use tracing::{debug, info};

pub(crate) fn register(registry: &mut StepRegistry<Context>) -> Result<()> {
    registry
        .step("a form definition key {string}", form_definition_key)?
        .step("a version {string} exists for form {string}", version_exists)?
        .table_step("multiple versions exist for form {string}", multiple_versions_exist)?
        .step("form {string} exists", form_exists)?
        .step("an active version {string} exists for form {string}", version_exists)?
        .step(
            "I create a new version {string} with valid definition",
            create_version_with_valid_definition,
        )?
        .step("I create a new version {string} for form {string}", create_version_for_form)?
        .step("I request the latest version for {string}", request_latest_version)?
        .step("I request version {string} for form {string}", request_version)?
        .step("I deprecate version {string}", deprecate_version)?
        .step("the response should contain version {string}", contains_version)?
        .step("the response should contain \"definition\" data", contains_definition)?
        .step("the version should be marked deprecated", version_marked_deprecated)?;
    Ok(())
}

fn version_payload(version: &str, published_date: Option<i64>) -> Value {
    let mut payload = json!({
        "name": format!("Form {version}"),
        "description": "Test form version",
        "version": version,
        "definition": {"fields": [{"name": "field1"}]}
    });
    if let Some(published) = published_date {
        payload["publishedDate"] = json!(published);
    }
    payload
}

/// POST a new version and ledger it when the API reports creation.
async fn post_version(ctx: &mut Context, key: &str, version: &str, payload: &Value) -> Result<ApiResponse> {
    let url = ctx.api_url(&endpoints::form_versions(key));
    let response = ctx.session.post_json(&url, payload).await?;
    if ctx.track_if_created(&response, ResourceKind::FormVersion, key, version) {
        ctx.created_version = Some(version.to_string());
        info!(key, version, "Form version created");
    }
    Ok(response)
}

/// Setup variant of [`post_version`]: anything but 201 fails the step.
async fn ensure_version(ctx: &mut Context, key: &str, version: &str, published_date: Option<i64>) -> Result<()> {
    let response = post_version(ctx, key, version, &version_payload(version, published_date)).await?;
    if response.status_code() != 201 {
        return Err(AssertionFailure::new(format!(
            "version creation failed: expected 201, got {}: {}",
            response.status, response.text
        ))
        .into());
    }
    ctx.form_key = Some(key.to_string());
    Ok(())
}

fn form_definition_key(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.form_key = Some(args.string(0)?);
        Ok(())
    })
}

fn form_exists(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.form_key = Some(args.string(0)?);
        Ok(())
    })
}

fn version_exists(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let version = args.string(0)?;
        let key = args.string(1)?;
        ensure_version(ctx, &key, &version, None).await
    })
}

fn multiple_versions_exist(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let key = args.string(0)?;
        for (row, record) in args.table()?.records().into_iter().enumerate() {
            let version = record.get("version").ok_or_else(|| HarnessError::InvalidParameter {
                pattern: "multiple versions exist for form {string}".to_string(),
                index: row,
                reason: "table row has no `version` column".to_string(),
            })?;
            let published_date = match record.get("publishedDate") {
                Some(raw) => Some(raw.trim().parse::<i64>().map_err(|e| HarnessError::InvalidParameter {
                    pattern: "multiple versions exist for form {string}".to_string(),
                    index: row,
                    reason: format!("publishedDate `{raw}` is not epoch milliseconds: {e}"),
                })?),
                None => None,
            };
            ensure_version(ctx, &key, version, published_date).await?;
        }
        Ok(())
    })
}

fn create_version_with_valid_definition(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let version = args.string(0)?;
        let key = Context::require("form_key", &ctx.form_key)?.to_string();
        let payload = json!({
            "name": "Test Form",
            "description": "Test Description",
            "version": version,
            "definition": {"fields": [{"name": "test"}]}
        });
        let response = post_version(ctx, &key, &version, &payload).await?;
        ctx.remember(response);
        Ok(())
    })
}

fn create_version_for_form(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let version = args.string(0)?;
        let key = args.string(1)?;
        let response = post_version(ctx, &key, &version, &version_payload(&version, None)).await?;
        ctx.form_key = Some(key);
        ctx.remember(response);
        Ok(())
    })
}

fn request_latest_version(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let url = ctx.api_url(&endpoints::latest_form_version(args.str(0)?));
        let response = ctx.session.get(&url).await?;
        ctx.remember(response);
        Ok(())
    })
}

fn request_version(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let url = ctx.api_url(&endpoints::form_version(args.str(1)?, args.str(0)?));
        let response = ctx.session.get(&url).await?;
        ctx.remember(response);
        Ok(())
    })
}

fn deprecate_version(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let version = args.string(0)?;
        let key = Context::require("form_key", &ctx.form_key)?.to_string();
        let url = ctx.api_url(&endpoints::deprecate_form_version(&key, &version));
        let response = ctx.session.post(&url).await?;
        if response.status.is_success() {
            debug!(key = %key, version = %version, "Form version deprecated");
            ctx.deprecated_version = Some(version);
        }
        ctx.remember(response);
        Ok(())
    })
}

fn contains_version(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected = args.str(0)?;
        let actual = text_of(required_field(ctx, "version")?);
        AssertionFailure::ensure(actual == expected, || {
            format!("response version: expected {expected}, got {actual}")
        })?;
        Ok(())
    })
}

fn contains_definition(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        required_field(ctx, "definition")?;
        Ok(())
    })
}

/// Re-fetches the version rather than trusting the deprecate response.
fn version_marked_deprecated(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let key = Context::require("form_key", &ctx.form_key)?;
        let version = match &ctx.deprecated_version {
            Some(version) => version.as_str(),
            None => Context::require("created_version", &ctx.created_version)?,
        };
        let url = ctx.api_url(&endpoints::form_version(key, version));
        let fetched = ctx.session.get(&url).await?;

        if fetched.status_code() != 200 {
            return Err(AssertionFailure::mismatch("verification status", 200, fetched.status_code()).into());
        }
        let deprecated = fetched.field("deprecated").and_then(Value::as_bool);
        AssertionFailure::ensure(deprecated == Some(true), || {
            format!("version {key}/{version}: expected deprecated true, got {deprecated:?}")
        })?;
        Ok(())
    })
}
