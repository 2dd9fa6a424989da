//! Per-scenario state shared by the steps of one scenario

use crate::auth::{LoginCredentials, ScenarioResource, SessionCredential};
use crate::config::ProbeConfig;
use crate::error::{AssertionFailure, HarnessError, Result};
use crate::ledger::{LedgerEntry, ResourceKind, ResourceLedger};
use crate::placeholders::{substitute, PathSlots};
use crate::session::{ApiResponse, ApiSession};
use serde_json::Value;
use std::fmt;

/// Typed scenario state.
///
/// Values captured by one step and read by a later one live in named fields
/// rather than a string-keyed map, so a misspelled slot is a compile error.
pub struct Context {
    base_url: String,
    /// Root that API endpoints resolve against; `base_url + API_PREFIX` unless
    /// a scenario points it elsewhere.
    pub api_root: String,
    pub login: Option<LoginCredentials>,
    pub api_token: Option<String>,
    pub session: ApiSession,
    pub session_credential: Option<SessionCredential>,
    pub browser: Option<Box<dyn ScenarioResource>>,
    pub last_response: Option<ApiResponse>,
    pub ledger: ResourceLedger,

    pub form_key: Option<String>,
    pub form_id: Option<String>,
    pub created_version: Option<String>,
    pub deprecated_version: Option<String>,
    pub definition_id: Option<String>,
    pub version_id: Option<String>,
    pub instance_id: Option<String>,
    pub task_id: Option<String>,
    pub request_body: Option<Value>,
}

impl Context {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            api_root: config.api_root(),
            login: Some(config.login.clone()),
            api_token: Some(config.api_token.clone()),
            session: ApiSession::new()?,
            session_credential: None,
            browser: None,
            last_response: None,
            ledger: ResourceLedger::new(),
            form_key: None,
            form_id: None,
            created_version: None,
            deprecated_version: None,
            definition_id: None,
            version_id: None,
            instance_id: None,
            task_id: None,
            request_body: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/forms/x/versions`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    /// Absolute URL for endpoint text from a scenario line, with
    /// `{definitionId}`-style placeholders filled from captured values.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        self.api_url(&substitute(endpoint, &self.path_slots()))
    }

    pub fn path_slots(&self) -> PathSlots {
        PathSlots::new()
            .with("formKey", self.form_key.as_deref())
            .with("formId", self.form_id.as_deref())
            .with("definitionId", self.definition_id.as_deref())
            .with("versionId", self.version_id.as_deref())
            .with("instanceId", self.instance_id.as_deref())
            .with("taskId", self.task_id.as_deref())
    }

    /// Store a response for the assertions that follow.
    pub fn remember(&mut self, response: ApiResponse) -> &ApiResponse {
        self.last_response.insert(response)
    }

    /// Ledger a created resource if `response` reports creation. The entry
    /// keeps the current API root, so later root changes do not redirect
    /// its cleanup.
    pub fn track_if_created(&mut self, response: &ApiResponse, kind: ResourceKind, key: &str, version: &str) -> bool {
        if response.status_code() != 201 {
            return false;
        }
        self.ledger.record(LedgerEntry::new(kind, self.api_root.clone(), key, version));
        true
    }

    pub fn response(&self) -> Result<&ApiResponse> {
        self.last_response
            .as_ref()
            .ok_or_else(|| AssertionFailure::new("no response has been received in this scenario").into())
    }

    pub fn require<'a>(slot: &'static str, value: &'a Option<String>) -> Result<&'a str> {
        value.as_deref().ok_or(HarnessError::MissingValue { slot })
    }

    /// Discard the scenario state and release its HTTP session.
    pub fn close(self) {
        self.session.close();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("base_url", &self.base_url)
            .field("api_root", &self.api_root)
            .field("session", &self.session)
            .field("browser", &self.browser.as_ref().map(|b| b.describe()))
            .field("last_status", &self.last_response.as_ref().map(|r| r.status_code()))
            .field("ledger", &self.ledger.len())
            .field("form_key", &self.form_key)
            .field("created_version", &self.created_version)
            .field("definition_id", &self.definition_id)
            .field("instance_id", &self.instance_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn context() -> Context {
        Context::new(&ProbeConfig::default()).unwrap()
    }

    #[test]
    fn test_urls_resolve_against_api_root() {
        let mut ctx = context();
        assert_eq!(ctx.base_url(), "http://localhost:8080");
        assert_eq!(ctx.api_url("/forms"), "http://localhost:8080/api/v1/forms");

        ctx.api_root = "http://other:9000/api".to_string();
        ctx.definition_id = Some("test_definition".to_string());
        assert_eq!(
            ctx.endpoint_url("/process/definitions/{definitionId}"),
            "http://other:9000/api/process/definitions/test_definition"
        );
        assert_eq!(
            ctx.endpoint_url("/process-instances/{instanceId}"),
            "http://other:9000/api/process-instances/"
        );
    }

    #[test]
    fn test_only_created_responses_are_tracked() {
        let mut ctx = context();
        let created = ApiResponse::from_parts(StatusCode::CREATED, "{}".to_string());
        let rejected = ApiResponse::from_parts(StatusCode::BAD_REQUEST, "{}".to_string());

        assert!(ctx.track_if_created(&created, ResourceKind::FormVersion, "f", "1.0"));
        assert!(!ctx.track_if_created(&rejected, ResourceKind::FormVersion, "f", "1.0"));
        assert_eq!(ctx.ledger.len(), 1);
    }

    #[test]
    fn test_ledger_entries_keep_the_root_they_were_created_under() {
        let mut ctx = context();
        let created = ApiResponse::from_parts(StatusCode::CREATED, "{}".to_string());
        ctx.track_if_created(&created, ResourceKind::FormVersion, "f", "1.0");
        ctx.api_root = "http://other:9000/api".to_string();

        let entry = &ctx.ledger.entries()[0];
        assert_eq!(entry.api_root, "http://localhost:8080/api/v1");
        assert_eq!(
            entry.deactivation().url,
            "http://localhost:8080/api/v1/forms/f/versions/1.0/deprecate"
        );
    }

    #[test]
    fn test_missing_response_is_assertion_failure() {
        let ctx = context();
        assert!(matches!(ctx.response(), Err(HarnessError::Assertion(_))));
        assert!(matches!(
            Context::require("form_key", &ctx.form_key),
            Err(HarnessError::MissingValue { slot: "form_key" })
        ));
    }
}
