//! The HTTP session a scenario issues its requests through

use crate::auth::{LoginCredentials, SessionCredential};
use crate::error::{HarnessError, Result};
use reqwest::cookie::Jar;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    Basic(LoginCredentials),
    Bearer(String),
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Basic(login) => write!(f, "Basic({})", login.username),
            Authorization::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

/// Status and body of the most recent response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Parsed JSON body; `Value::Null` when the body is empty or not JSON.
    pub body: Value,
    pub text: String,
}

impl ApiResponse {
    pub fn from_parts(status: StatusCode, text: String) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };
        Self { status, body, text }
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// A field rendered as text; strings are unquoted, other values use JSON.
    pub fn field_text(&self, name: &str) -> Option<String> {
        self.field(name).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// HTTP client state owned by one scenario.
pub struct ApiSession {
    client: reqwest::Client,
    cookies: Arc<Jar>,
    authorization: Option<Authorization>,
}

impl fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSession")
            .field("authorization", &self.authorization)
            .finish()
    }
}

impl ApiSession {
    pub fn new() -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .build()
            .map_err(|e| HarnessError::config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            cookies,
            authorization: None,
        })
    }

    pub fn authorize(&mut self, authorization: Authorization) {
        debug!(?authorization, "Session authorization set");
        self.authorization = Some(authorization);
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    /// Present `credential` on every later request to `base_url`.
    pub fn install_credential(&mut self, credential: &SessionCredential, base_url: &str) -> Result<()> {
        match credential {
            SessionCredential::Cookie { name, value } => {
                let url = Url::parse(base_url)
                    .map_err(|e| HarnessError::config(format!("invalid base URL `{base_url}`: {e}")))?;
                self.cookies
                    .add_cookie_str(&format!("{name}={value}; Path=/"), &url);
                debug!(cookie = %name, "Session cookie installed");
            }
            SessionCredential::Bearer(token) => {
                self.authorize(Authorization::Bearer(token.clone()));
            }
        }
        Ok(())
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::GET, url, None).await
    }

    pub async fn post(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::POST, url, None).await
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::POST, url, Some(body)).await
    }

    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, url, None).await
    }

    #[instrument(skip(self, body), fields(status = tracing::field::Empty))]
    pub async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.apply_authorization(request);

        let http_error = |source: reqwest::Error| HarnessError::Http {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(http_error)?;
        let status = response.status();
        let text = response.text().await.map_err(http_error)?;

        tracing::Span::current().record("status", status.as_u16());
        debug!(status = status.as_u16(), bytes = text.len(), "Response received");
        Ok(ApiResponse::from_parts(status, text))
    }

    fn apply_authorization(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.authorization {
            Some(Authorization::Basic(login)) => {
                request.basic_auth(&login.username, Some(&login.password))
            }
            Some(Authorization::Bearer(token)) => request.bearer_auth(token),
            None => request,
        }
    }

    /// End the session; cookies and pooled connections go with it.
    pub fn close(self) {
        debug!("HTTP session closed");
    }
}
