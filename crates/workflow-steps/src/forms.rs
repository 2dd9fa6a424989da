//! Form API steps

use crate::{require_fields, required_field, text_of};
use probe_core::{endpoints, AssertionFailure, Authorization, Context, HarnessError, Result};
use serde_json::{json, Value};
use step_registry::{StepArgs, StepFuture, StepRegistry};
use tracing::debug;

pub(crate) fn register(registry: &mut StepRegistry<Context>) -> Result<()> {
    registry
        .step("the form API is available", form_api_available)?
        .step("I POST valid form data to {string}", post_valid_form)?
        .step("a form version exists with ID {string}", form_version_exists)?
        .step("I GET {string}", get_endpoint)?
        .step("the response should contain form metadata", contains_form_metadata)?
        .step(
            "the response should contain the form version details",
            contains_form_version_details,
        )?;
    Ok(())
}

fn valid_form() -> Value {
    json!({
        "name": "Test Form",
        "version": "1.0",
        "definition": {"fields": []}
    })
}

fn form_api_available(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let login = ctx.login.clone().ok_or(HarnessError::MissingValue { slot: "login" })?;
        ctx.session.authorize(Authorization::Basic(login));
        Ok(())
    })
}

fn post_valid_form(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let url = ctx.endpoint_url(args.str(0)?);
        let response = ctx.session.post_json(&url, &valid_form()).await?;
        if response.status_code() == 201 {
            ctx.form_id = response.field_text("id");
            debug!(form_id = ?ctx.form_id, "Form created");
        }
        ctx.remember(response);
        Ok(())
    })
}

fn form_version_exists(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let form_id = args.string(0)?;
        let url = ctx.api_url(endpoints::FORMS);
        let response = ctx.session.post_json(&url, &valid_form()).await?;
        if response.status_code() != 201 {
            return Err(AssertionFailure::new(format!(
                "form creation: expected 201, got {}: {}",
                response.status, response.text
            ))
            .into());
        }
        ctx.form_id = Some(form_id);
        Ok(())
    })
}

fn get_endpoint(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let url = ctx.endpoint_url(args.str(0)?);
        let response = ctx.session.get(&url).await?;
        ctx.remember(response);
        Ok(())
    })
}

fn contains_form_metadata(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move { require_fields(ctx, &["id", "name", "version"]) })
}

fn contains_form_version_details(ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected = Context::require("form_id", &ctx.form_id)?;
        let actual = text_of(required_field(ctx, "id")?);
        if actual != expected {
            return Err(AssertionFailure::mismatch("form id", expected, actual).into());
        }
        required_field(ctx, "definition")?;
        Ok(())
    })
}
