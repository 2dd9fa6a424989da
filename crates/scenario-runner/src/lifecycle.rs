//! Per-scenario setup and guaranteed teardown

use crate::cleanup::{deactivate_all, CleanupReport};
use probe_core::{Authenticator, Context, HarnessError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Scenarios carrying this tag log in through the authenticator first.
pub const AUTHENTICATION_TAG: &str = "authentication";

/// What happened to the scenario's browser at teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserRelease {
    NotAcquired,
    Released(String),
    Failed { resource: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct TeardownReport {
    pub cleanup: CleanupReport,
    pub browser: BrowserRelease,
}

#[derive(Clone, Default)]
pub struct LifecycleManager {
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("authenticator", &self.authenticator.is_some())
            .finish()
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_authenticator(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator: Some(authenticator),
        }
    }

    /// Reset the ledger and, for `@authentication` scenarios, log in.
    ///
    /// A browser acquired during a failed login is still stored on the
    /// context so [`LifecycleManager::after_scenario`] releases it.
    #[instrument(skip_all, fields(tags = ?tags))]
    pub async fn before_scenario(&self, ctx: &mut Context, tags: &[String]) -> Result<()> {
        ctx.ledger.reset();
        if !tags.iter().any(|tag| tag == AUTHENTICATION_TAG) {
            return Ok(());
        }

        let authenticator = self.authenticator.as_ref().ok_or_else(|| {
            HarnessError::config("scenario requires authentication but no authenticator is configured")
        })?;
        let login = ctx
            .login
            .clone()
            .ok_or_else(|| HarnessError::config("scenario requires authentication but no login is configured"))?;

        let outcome = authenticator.authenticate(ctx.base_url(), &login).await;
        ctx.browser = outcome.resource;
        let credential = outcome.credential?;

        let base_url = ctx.base_url().to_string();
        ctx.session.install_credential(&credential, &base_url)?;
        ctx.session_credential = Some(credential);
        info!("Session credential installed");
        Ok(())
    }

    /// Tear the scenario down. Consumes the context, so it runs at most once
    /// per scenario; nothing in here fails the scenario.
    #[instrument(skip_all, fields(ledger = ctx.ledger.len()))]
    pub async fn after_scenario(&self, mut ctx: Context) -> TeardownReport {
        let entries = ctx.ledger.drain();
        let cleanup = deactivate_all(&ctx.session, entries).await;

        let browser = match ctx.browser.take() {
            None => BrowserRelease::NotAcquired,
            Some(resource) => {
                let description = resource.describe();
                match resource.release().await {
                    Ok(()) => BrowserRelease::Released(description),
                    Err(e) => {
                        warn!(resource = %description, error = %e, "Failed to release browser");
                        BrowserRelease::Failed {
                            resource: description,
                            reason: e.to_string(),
                        }
                    }
                }
            }
        };

        ctx.close();
        TeardownReport { cleanup, browser }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::{endpoints, ProbeConfig, ResourceKind};
    use serde_json::json;

    #[tokio::test]
    async fn test_cleanup_uses_the_root_a_resource_was_created_under() {
        let (addr, stub) = workflow_stub::spawn("127.0.0.1:0").await.unwrap();
        let config = ProbeConfig {
            base_url: format!("http://{addr}"),
            ..ProbeConfig::default()
        };
        let mut ctx = Context::new(&config).unwrap();
        let lifecycle = LifecycleManager::new();
        lifecycle.before_scenario(&mut ctx, &[]).await.unwrap();

        let url = ctx.api_url(&endpoints::form_versions("relocated"));
        let body = json!({"name": "Form 1.0", "version": "1.0", "definition": {"fields": []}});
        let response = ctx.session.post_json(&url, &body).await.unwrap();
        assert!(ctx.track_if_created(&response, ResourceKind::FormVersion, "relocated", "1.0"));

        ctx.api_root = format!("http://{addr}/other");
        let report = lifecycle.after_scenario(ctx).await;

        assert_eq!(report.cleanup.attempted, 1);
        assert!(report.cleanup.is_clean(), "{:?}", report.cleanup.failures);
        assert_eq!(stub.deprecation_calls("relocated", "1.0"), 1);
        assert!(stub.form_version("relocated", "1.0").unwrap().deprecated);
    }
}
