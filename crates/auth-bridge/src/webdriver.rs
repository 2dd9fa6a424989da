//! Minimal W3C WebDriver client

use probe_core::HarnessError;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};

/// Key under which W3C WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735c6d8f3c";

#[derive(Error, Debug)]
pub enum WebDriverError {
    #[error("WebDriver request {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("WebDriver returned {status} `{error}`: {message}")]
    Protocol {
        status: StatusCode,
        error: String,
        message: String,
    },

    #[error("WebDriver response is malformed: {reason}")]
    Malformed { reason: String },
}

impl WebDriverError {
    fn is(&self, code: &str) -> bool {
        matches!(self, WebDriverError::Protocol { error, .. } if error == code)
    }
}

impl From<WebDriverError> for HarnessError {
    fn from(error: WebDriverError) -> Self {
        HarnessError::browser(error)
    }
}

#[derive(Deserialize)]
struct Envelope {
    value: Value,
}

#[derive(Deserialize)]
struct ProtocolError {
    error: String,
    #[serde(default)]
    message: String,
}

/// HTTP client for one WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    endpoint: String,
}

impl WebDriverClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether the driver reports itself ready for new sessions.
    pub async fn is_ready(&self) -> bool {
        match self.call(Method::GET, "/status", None).await {
            Ok(value) => value.get("ready").and_then(Value::as_bool).unwrap_or(false),
            Err(_) => false,
        }
    }

    #[instrument(skip(self, chrome_args), fields(endpoint = %self.endpoint))]
    pub async fn new_session(&self, chrome_args: &[&str]) -> Result<WebDriverSession, WebDriverError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": chrome_args }
                }
            }
        });
        let value = self.call(Method::POST, "/session", Some(capabilities)).await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::Malformed {
                reason: format!("new session response has no sessionId: {value}"),
            })?;
        debug!(session = id, "WebDriver session created");
        Ok(WebDriverSession {
            client: self.clone(),
            id: id.to_string(),
        })
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, WebDriverError> {
        let url = format!("{}{}", self.endpoint, path);
        let transport = |source| WebDriverError::Transport {
            url: url.clone(),
            source,
        };

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let envelope: Envelope = response.json().await.map_err(transport)?;

        if status.is_success() {
            return Ok(envelope.value);
        }
        let error: ProtocolError =
            serde_json::from_value(envelope.value).map_err(|e| WebDriverError::Malformed {
                reason: format!("error response without error code: {e}"),
            })?;
        Err(WebDriverError::Protocol {
            status,
            error: error.error,
            message: error.message,
        })
    }
}

/// A live browser session.
#[derive(Debug)]
pub struct WebDriverSession {
    client: WebDriverClient,
    id: String,
}

impl WebDriverSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, WebDriverError> {
        self.client
            .call(method, &format!("/session/{}{}", self.id, path), body)
            .await
    }

    pub async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        self.call(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<String>, WebDriverError> {
        let locator = json!({ "using": "css selector", "value": format!("[id=\"{id}\"]") });
        match self.call(Method::POST, "/element", Some(locator)).await {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|element| Some(element.to_string()))
                .ok_or_else(|| WebDriverError::Malformed {
                    reason: format!("element response without reference: {value}"),
                }),
            Err(error) if error.is("no such element") => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub async fn send_keys(&self, element: &str, text: &str) -> Result<(), WebDriverError> {
        self.call(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    pub async fn click(&self, element: &str) -> Result<(), WebDriverError> {
        self.call(Method::POST, &format!("/element/{element}/click"), Some(json!({})))
            .await?;
        Ok(())
    }

    pub async fn cookie(&self, name: &str) -> Result<Option<String>, WebDriverError> {
        match self.call(Method::GET, &format!("/cookie/{name}"), None).await {
            Ok(value) => Ok(value.get("value").and_then(Value::as_str).map(str::to_owned)),
            Err(error) if error.is("no such cookie") => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub async fn delete(self) -> Result<(), WebDriverError> {
        self.call(Method::DELETE, "", None).await?;
        debug!(session = %self.id, "WebDriver session deleted");
        Ok(())
    }
}
