//! # workflow-steps
//!
//! The step vocabulary for the workflow API: actions that issue one request
//! each and keep the response on the [`Context`], and assertions that read it.
//!
//! Creation steps record a ledger entry only when the API answers 201, so the
//! lifecycle manager deprecates or undeploys exactly what a scenario created.

mod assertions;
mod form_versions;
mod forms;
mod process;

use probe_core::{AssertionFailure, Context, Result};
use serde_json::Value;
use step_registry::StepRegistry;

pub use probe_core;
pub use step_registry;

/// Every workflow step, checked for ambiguity as it is registered.
pub fn registry() -> Result<StepRegistry<Context>> {
    let mut registry = StepRegistry::new();
    forms::register(&mut registry)?;
    form_versions::register(&mut registry)?;
    process::register(&mut registry)?;
    assertions::register(&mut registry)?;
    tracing::debug!(steps = registry.len(), "Workflow step registry built");
    Ok(registry)
}

/// The named field of the last response, failing when it is absent or null.
pub(crate) fn required_field<'a>(ctx: &'a Context, name: &str) -> Result<&'a Value> {
    let response = ctx.response()?;
    match response.field(name) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(AssertionFailure::new(format!(
            "response has no `{name}` field (status {}): {}",
            response.status_code(),
            response.text
        ))
        .into()),
    }
}

pub(crate) fn require_fields(ctx: &Context, names: &[&str]) -> Result<()> {
    for name in names {
        required_field(ctx, name)?;
    }
    Ok(())
}

/// A JSON value as text: strings unquoted, everything else as JSON.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
