//! Harness configuration resolved from the environment

use crate::auth::LoginCredentials;
use crate::error::{HarnessError, Result};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_PROVIDER: &str = "keycloak";
pub const DEFAULT_API_TOKEN: &str = "test-token";
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How the authentication bridge reaches a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebDriverSettings {
    /// Existing WebDriver endpoint; when unset a local driver is spawned.
    pub url: Option<String>,
    pub chromedriver: PathBuf,
    pub headless: bool,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            url: None,
            chromedriver: PathBuf::from("chromedriver"),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub login: LoginCredentials,
    pub api_token: String,
    pub provider: String,
    pub login_timeout: Duration,
    pub webdriver: WebDriverSettings,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            login: LoginCredentials::new("testuser", "testpass"),
            api_token: DEFAULT_API_TOKEN.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            webdriver: WebDriverSettings::default(),
        }
    }
}

impl ProbeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup`, falling back to defaults.
    ///
    /// `TEST_USER`/`TEST_PASS` take precedence over
    /// `OAUTH_USERNAME`/`OAUTH_PASSWORD`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base_url = match get("API_BASE_URL") {
            Some(url) => normalize_url(&url)?,
            None => defaults.base_url,
        };
        let api_prefix = get("API_PREFIX")
            .map(|prefix| normalize_prefix(&prefix))
            .unwrap_or(defaults.api_prefix);

        let username = get("TEST_USER")
            .or_else(|| get("OAUTH_USERNAME"))
            .unwrap_or(defaults.login.username);
        let password = get("TEST_PASS")
            .or_else(|| get("OAUTH_PASSWORD"))
            .unwrap_or(defaults.login.password);

        let login_timeout = match get("LOGIN_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    HarnessError::config(format!("LOGIN_TIMEOUT_SECS must be whole seconds, got `{raw}`"))
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.login_timeout,
        };

        let headless = match get("BROWSER_HEADLESS") {
            Some(raw) => parse_bool("BROWSER_HEADLESS", &raw)?,
            None => defaults.webdriver.headless,
        };
        let webdriver = WebDriverSettings {
            url: get("WEBDRIVER_URL").map(|url| normalize_url(&url)).transpose()?,
            chromedriver: get("CHROMEDRIVER")
                .map(PathBuf::from)
                .unwrap_or(defaults.webdriver.chromedriver),
            headless,
        };

        Ok(Self {
            base_url,
            api_prefix,
            login: LoginCredentials::new(username, password),
            api_token: get("API_TOKEN").unwrap_or(defaults.api_token),
            provider: get("OAUTH_PROVIDER").unwrap_or(defaults.provider),
            login_timeout,
            webdriver,
        })
    }

    /// Base URL plus API prefix, without a trailing slash.
    pub fn api_root(&self) -> String {
        format!("{}{}", self.base_url, self.api_prefix)
    }
}

/// Validate `raw` as an absolute URL and strip trailing slashes.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    Url::parse(trimmed).map_err(|e| HarnessError::config(format!("invalid URL `{trimmed}`: {e}")))?;
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HarnessError::config(format!("{key} must be a boolean, got `{raw}`"))),
    }
}
