//! Authentication seam between the lifecycle manager and whatever acquires credentials

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Username/password pair submitted to the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credential an authenticated session presents on every request.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionCredential {
    Cookie { name: String, value: String },
    Bearer(String),
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionCredential::Cookie { name, .. } => write!(f, "Cookie({name}=<redacted>)"),
            SessionCredential::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

/// Something a scenario holds until teardown, such as a browser process.
#[async_trait]
pub trait ScenarioResource: Send + Sync {
    fn describe(&self) -> String;

    async fn release(self: Box<Self>) -> Result<()>;
}

/// Result of one authentication attempt.
///
/// `resource` is returned even when `credential` is an error so that the
/// caller can release whatever was acquired before the failure.
pub struct AuthOutcome {
    pub resource: Option<Box<dyn ScenarioResource>>,
    pub credential: Result<SessionCredential>,
}

impl AuthOutcome {
    pub fn failed(resource: Option<Box<dyn ScenarioResource>>, error: crate::HarnessError) -> Self {
        Self {
            resource,
            credential: Err(error),
        }
    }
}

impl fmt::Debug for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOutcome")
            .field("resource", &self.resource.as_ref().map(|r| r.describe()))
            .field("credential", &self.credential)
            .finish()
    }
}

/// Turns login credentials into a session credential.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, base_url: &str, credentials: &LoginCredentials) -> AuthOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_are_redacted() {
        let login = LoginCredentials::new("alice", "hunter2");
        assert!(!format!("{login:?}").contains("hunter2"));

        let cookie = SessionCredential::Cookie {
            name: "JSESSIONID".to_string(),
            value: "abc123".to_string(),
        };
        assert_eq!(format!("{cookie:?}"), "Cookie(JSESSIONID=<redacted>)");
    }
}
