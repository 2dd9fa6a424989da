//! # flowprobe core
//!
//! Per-scenario state for the flowprobe integration-test harness.
//!
//! - [`Context`] is the typed bag of state one scenario's steps share.
//! - [`ApiSession`] owns the HTTP client, its cookie jar and authorization.
//! - [`ResourceLedger`] records every resource a scenario created so teardown
//!   can deactivate it.
//! - [`HarnessError`] is the error taxonomy every other crate reports through.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod placeholders;
pub mod session;

pub use auth::{AuthOutcome, Authenticator, LoginCredentials, ScenarioResource, SessionCredential};
pub use config::{ProbeConfig, WebDriverSettings};
pub use context::Context;
pub use error::{AssertionFailure, ErrorCategory, HarnessError, Result};
pub use ledger::{Deactivation, LedgerEntry, ResourceKind, ResourceLedger};
pub use placeholders::{substitute, PathSlots};
pub use session::{ApiResponse, ApiSession, Authorization};

/// Current flowprobe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information for log banners
pub const BUILD_INFO: &str = concat!(
    "flowprobe ",
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CARGO_PKG_NAME"),
    ")"
);

/// Paths of the target workflow API, relative to the API root.
pub mod endpoints {
    pub const FORMS: &str = "/forms";
    pub const PROCESS_DEFINITIONS: &str = "/process/definitions";
    pub const PROCESS_INSTANCES: &str = "/process-instances";

    pub fn form_versions(key: &str) -> String {
        format!("{FORMS}/{key}/versions")
    }

    pub fn form_version(key: &str, version: &str) -> String {
        format!("{FORMS}/{key}/versions/{version}")
    }

    pub fn latest_form_version(key: &str) -> String {
        format!("{FORMS}/{key}/versions/latest")
    }

    pub fn deprecate_form_version(key: &str, version: &str) -> String {
        format!("{FORMS}/{key}/versions/{version}/deprecate")
    }

    pub fn process_versions(definition_id: &str) -> String {
        format!("{PROCESS_DEFINITIONS}/{definition_id}/versions")
    }

    pub fn active_process_version(definition_id: &str, version_id: &str) -> String {
        format!("{PROCESS_DEFINITIONS}/{definition_id}/versions/{version_id}/active")
    }

    /// Identity-provider entry point, relative to the base URL (not the API root).
    pub fn oauth_authorization(provider: &str) -> String {
        format!("/oauth2/authorization/{provider}")
    }
}
