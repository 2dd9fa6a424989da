//! Interactive login through the identity provider

use crate::browser::{Browser, BrowserLauncher, ElementId};
use crate::driver::WebDriverLauncher;
use async_trait::async_trait;
use probe_core::config::ProbeConfig;
use probe_core::{
    endpoints, AuthOutcome, Authenticator, HarnessError, LoginCredentials, Result, ScenarioResource,
    SessionCredential,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const DEFAULT_SESSION_COOKIE: &str = "JSESSIONID";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Element ids of the provider's login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub submit: String,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            username: "username".to_string(),
            password: "password".to_string(),
            submit: "kc-login".to_string(),
        }
    }
}

/// Logs in through a browser and returns the provider-issued session cookie.
#[derive(Clone)]
pub struct AuthBridge {
    launcher: Arc<dyn BrowserLauncher>,
    provider: String,
    form: LoginForm,
    cookie_name: String,
    login_timeout: Duration,
    poll_interval: Duration,
}

impl AuthBridge {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, provider: impl Into<String>, login_timeout: Duration) -> Self {
        Self {
            launcher,
            provider: provider.into(),
            form: LoginForm::default(),
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            login_timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Bridge driving a real browser over WebDriver.
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            Arc::new(WebDriverLauncher::new(config.webdriver.clone())),
            config.provider.clone(),
            config.login_timeout,
        )
    }

    pub fn with_form(mut self, form: LoginForm) -> Self {
        self.form = form;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn login(
        &self,
        browser: &mut dyn Browser,
        base_url: &str,
        credentials: &LoginCredentials,
    ) -> Result<SessionCredential> {
        let login_url = format!("{base_url}{}", endpoints::oauth_authorization(&self.provider));
        browser.goto(&login_url).await?;

        let username = self.wait_for(browser, &self.form.username, &login_url).await?;
        browser.type_text(&username, &credentials.username).await?;
        let password = self.required(browser, &self.form.password, &login_url).await?;
        browser.type_text(&password, &credentials.password).await?;
        let submit = self.required(browser, &self.form.submit, &login_url).await?;
        browser.click(&submit).await?;

        match browser.cookie(&self.cookie_name).await? {
            Some(value) => Ok(SessionCredential::Cookie {
                name: self.cookie_name.clone(),
                value,
            }),
            None => Err(HarnessError::SessionCookieMissing {
                cookie: self.cookie_name.clone(),
            }),
        }
    }

    /// Poll for `id` until it appears or the login timeout elapses.
    async fn wait_for(&self, browser: &mut dyn Browser, id: &str, url: &str) -> Result<ElementId> {
        let poll = async {
            loop {
                if let Some(element) = browser.find_by_id(id).await? {
                    return Ok(element);
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        match tokio::time::timeout(self.login_timeout, poll).await {
            Ok(found) => found,
            Err(_) => Err(HarnessError::LoginPageTimeout {
                url: url.to_string(),
                element: id.to_string(),
                timeout: self.login_timeout,
            }),
        }
    }

    /// Elements that must be present once the form has rendered.
    async fn required(&self, browser: &mut dyn Browser, id: &str, url: &str) -> Result<ElementId> {
        browser.find_by_id(id).await?.ok_or_else(|| {
            HarnessError::browser(format!("login form at {url} has no element `{id}`"))
        })
    }
}

#[async_trait]
impl Authenticator for AuthBridge {
    #[instrument(skip(self, credentials), fields(provider = %self.provider))]
    async fn authenticate(&self, base_url: &str, credentials: &LoginCredentials) -> AuthOutcome {
        let mut browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => return AuthOutcome::failed(None, e),
        };

        let credential = self.login(browser.as_mut(), base_url, credentials).await;
        match &credential {
            Ok(_) => info!(cookie = %self.cookie_name, "Interactive login succeeded"),
            Err(e) => warn!(error = %e, "Interactive login failed"),
        }
        AuthOutcome {
            resource: Some(Box::new(BrowserHandle { browser })),
            credential,
        }
    }
}

/// Browser kept alive until scenario teardown.
struct BrowserHandle {
    browser: Box<dyn Browser>,
}

#[async_trait]
impl ScenarioResource for BrowserHandle {
    fn describe(&self) -> String {
        self.browser.describe()
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.browser.quit().await
    }
}
