//! Assertions shared by every API area

use probe_core::{AssertionFailure, Context, Result};
use serde_json::Value;
use step_registry::{StepArgs, StepFuture, StepRegistry};

pub(crate) fn register(registry: &mut StepRegistry<Context>) -> Result<()> {
    registry
        .step("the response status should be {int}", status_is)?
        .step("response status should be {int}", status_is)?
        .step("the response should contain {string}", message_contains)?;
    Ok(())
}

fn status_is(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected = args.int(0)?;
        let response = ctx.response()?;
        let actual = i64::from(response.status_code());
        if actual != expected {
            return Err(AssertionFailure::new(format!(
                "response status: expected {expected}, got {actual}: {}",
                response.text
            ))
            .into());
        }
        Ok(())
    })
}

/// Looks in the error `message` field, falling back to the raw body.
fn message_contains(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected = args.str(0)?;
        let response = ctx.response()?;
        let message = response
            .field("message")
            .and_then(Value::as_str)
            .unwrap_or(response.text.as_str());
        AssertionFailure::ensure(message.contains(expected), || {
            format!("response message: expected to contain `{expected}`, got `{message}`")
        })?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::{ApiResponse, HarnessError, ProbeConfig};
    use reqwest::StatusCode;
    use step_registry::StepLine;

    fn context_with(status: u16, body: &str) -> Context {
        let mut ctx = Context::new(&ProbeConfig::default()).unwrap();
        ctx.remember(ApiResponse::from_parts(
            StatusCode::from_u16(status).unwrap(),
            body.to_string(),
        ));
        ctx
    }

    fn run(ctx: &mut Context, text: &str) -> Result<()> {
        let registry = crate::registry().unwrap();
        let line = StepLine::new("Then ", text, "assertions.feature:1");
        tokio_test::block_on(registry.dispatch(ctx, &line))
    }

    #[test]
    fn test_status_mismatch_reports_expected_and_actual() {
        let mut ctx = context_with(400, r#"{"message":"Version already exists for form: leave"}"#);

        let error = run(&mut ctx, "the response status should be 201").unwrap_err();

        assert!(matches!(error, HarnessError::Assertion(_)));
        assert!(error.to_string().starts_with("response status: expected 201, got 400"));
        assert!(run(&mut ctx, "response status should be 400").is_ok());
    }

    #[test]
    fn test_message_containment() {
        let mut ctx = context_with(400, r#"{"message":"Version already exists for form: leave"}"#);
        assert!(run(&mut ctx, "the response should contain \"Version already exists\"").is_ok());
        assert!(run(&mut ctx, "the response should contain \"not found\"").is_err());
    }

    #[test]
    fn test_assertions_without_a_response_fail() {
        let mut ctx = Context::new(&ProbeConfig::default()).unwrap();
        let error = run(&mut ctx, "response should contain instance details").unwrap_err();
        assert!(error.to_string().contains("no response"));
    }
}
