//! WebDriver-backed browser and the local chromedriver process

use crate::browser::{Browser, BrowserLauncher, ElementId};
use crate::webdriver::{WebDriverClient, WebDriverSession};
use async_trait::async_trait;
use probe_core::config::WebDriverSettings;
use probe_core::{HarnessError, Result};
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const READY_ATTEMPTS: usize = 30;
const READY_INTERVAL: Duration = Duration::from_millis(100);

/// Chrome flags for an isolated, container-friendly browser.
fn chrome_args(headless: bool) -> Vec<&'static str> {
    let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage"];
    if headless {
        args.insert(0, "--headless");
    }
    args
}

/// A chromedriver child process owned by one browser session. The process
/// is killed when this value is dropped.
#[derive(Debug)]
pub struct ChromeDriverProcess {
    child: Child,
    endpoint: String,
}

impl ChromeDriverProcess {
    pub async fn spawn(binary: &Path, http: &reqwest::Client) -> Result<Self> {
        let port = free_port()?;
        let child = Command::new(binary)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HarnessError::browser(format!("cannot start {}: {e}", binary.display())))?;

        let mut driver = Self {
            child,
            endpoint: format!("http://127.0.0.1:{port}"),
        };
        let client = WebDriverClient::new(http.clone(), driver.endpoint.clone());
        for _ in 0..READY_ATTEMPTS {
            if client.is_ready().await {
                debug!(endpoint = %driver.endpoint, "chromedriver ready");
                return Ok(driver);
            }
            tokio::time::sleep(READY_INTERVAL).await;
        }

        driver.kill().await;
        Err(HarnessError::browser(format!(
            "chromedriver at {} did not become ready",
            driver.endpoint
        )))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to stop chromedriver");
        }
    }
}

fn free_port() -> Result<u16> {
    let listener =
        TcpListener::bind("127.0.0.1:0").map_err(|e| HarnessError::browser(format!("no free port: {e}")))?;
    listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(|e| HarnessError::browser(format!("no free port: {e}")))
}

/// A browser driven over WebDriver, plus the driver process when this
/// harness started one.
#[derive(Debug)]
pub struct WebDriverBrowser {
    session: WebDriverSession,
    driver: Option<ChromeDriverProcess>,
}

#[async_trait]
impl Browser for WebDriverBrowser {
    fn describe(&self) -> String {
        format!("browser session {}", self.session.id())
    }

    async fn goto(&mut self, url: &str) -> Result<()> {
        Ok(self.session.navigate(url).await?)
    }

    async fn find_by_id(&mut self, id: &str) -> Result<Option<ElementId>> {
        Ok(self.session.find_by_id(id).await?.map(ElementId))
    }

    async fn type_text(&mut self, element: &ElementId, text: &str) -> Result<()> {
        Ok(self.session.send_keys(&element.0, text).await?)
    }

    async fn click(&mut self, element: &ElementId) -> Result<()> {
        Ok(self.session.click(&element.0).await?)
    }

    async fn cookie(&mut self, name: &str) -> Result<Option<String>> {
        Ok(self.session.cookie(name).await?)
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        let WebDriverBrowser { session, driver } = *self;
        let id = session.id().to_string();
        let deleted = session.delete().await;
        if let Some(mut driver) = driver {
            driver.kill().await;
        }
        info!(session = %id, "Browser closed");
        Ok(deleted?)
    }
}

/// Launches a fresh WebDriver session per scenario, spawning chromedriver
/// unless an endpoint is configured.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    settings: WebDriverSettings,
    http: reqwest::Client,
}

impl WebDriverLauncher {
    pub fn new(settings: WebDriverSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>> {
        let (endpoint, mut driver) = match &self.settings.url {
            Some(url) => (url.clone(), None),
            None => {
                let driver = ChromeDriverProcess::spawn(&self.settings.chromedriver, &self.http).await?;
                (driver.endpoint().to_string(), Some(driver))
            }
        };

        let client = WebDriverClient::new(self.http.clone(), endpoint);
        match client.new_session(&chrome_args(self.settings.headless)).await {
            Ok(session) => {
                info!(session = session.id(), endpoint = client.endpoint(), "Browser launched");
                Ok(Box::new(WebDriverBrowser { session, driver }))
            }
            Err(e) => {
                if let Some(driver) = driver.as_mut() {
                    driver.kill().await;
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_args_follow_headless_setting() {
        assert_eq!(
            chrome_args(true),
            vec!["--headless", "--no-sandbox", "--disable-dev-shm-usage"]
        );
        assert!(!chrome_args(false).contains(&"--headless"));
    }

    #[tokio::test]
    async fn test_missing_chromedriver_binary_is_browser_error() {
        let settings = WebDriverSettings {
            url: None,
            chromedriver: "/nonexistent/flowprobe-chromedriver".into(),
            headless: true,
        };
        let launcher = WebDriverLauncher::new(settings);
        match launcher.launch().await {
            Err(HarnessError::Browser { reason }) => assert!(reason.contains("cannot start")),
            Err(other) => panic!("expected browser error, got {other:?}"),
            Ok(_) => panic!("launch should fail without a driver binary"),
        }
    }
}
