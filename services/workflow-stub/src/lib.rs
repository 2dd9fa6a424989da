//! # workflow-stub
//!
//! An in-memory stand-in for the workflow forms and process API, used by the
//! harness's own tests and for running feature files without a backend.
//! Seeded with the fixture definitions and instances the process scenarios
//! refer to, and with hooks for injecting deactivation failures.

mod forms;
mod process;
pub mod state;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use probe_core::{config::DEFAULT_API_PREFIX, endpoints};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

pub use state::StubState;

/// Error body in the shape the real API reports failures with.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "status": self.status.as_u16(),
            "error": self.status.canonical_reason().unwrap_or("Error"),
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub(crate) type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

pub(crate) fn respond(status: StatusCode, body: impl serde::Serialize) -> ApiResult {
    let body = serde_json::to_value(body).map_err(|e| ApiError::internal(e.to_string()))?;
    Ok((status, Json(body)))
}

pub fn router(state: Arc<StubState>) -> Router {
    let process = Router::new()
        .route(
            endpoints::PROCESS_DEFINITIONS,
            get(process::list_definitions).post(process::create_definition),
        )
        .route(
            &format!("{}/{{definition_id}}", endpoints::PROCESS_DEFINITIONS),
            get(process::get_definition),
        )
        .route(
            &endpoints::process_versions("{definition_id}"),
            get(process::list_versions).post(process::create_version),
        )
        .route(
            &format!("{}/{{version}}", endpoints::process_versions("{definition_id}")),
            get(process::get_version),
        )
        .route(
            &endpoints::active_process_version("{definition_id}", "{version}"),
            post(process::activate_version).delete(process::undeploy_version),
        )
        .route(endpoints::PROCESS_INSTANCES, post(process::start_instance))
        .route(
            &format!("{}/{{instance_id}}", endpoints::PROCESS_INSTANCES),
            get(process::get_instance),
        )
        .route(
            &format!("{}/{{instance_id}}/tasks", endpoints::PROCESS_INSTANCES),
            get(process::list_tasks),
        )
        .route_layer(middleware::from_fn(require_credentials));

    let api = Router::new()
        .route(endpoints::FORMS, get(forms::list_form_keys).post(forms::create_form))
        .route(&format!("{}/{{key}}", endpoints::FORMS), get(forms::get_form))
        .route(
            &endpoints::form_versions("{key}"),
            get(forms::list_versions).post(forms::create_version),
        )
        .route(&endpoints::latest_form_version("{key}"), get(forms::latest_version))
        .route(&endpoints::form_version("{key}", "{version}"), get(forms::get_version))
        .route(
            &endpoints::deprecate_form_version("{key}", "{version}"),
            post(forms::deprecate_version),
        )
        .merge(process)
        .layer(middleware::from_fn_with_state(state.clone(), count_requests));

    Router::new()
        .route("/health", get(health_check))
        .nest(DEFAULT_API_PREFIX, api)
        .with_state(state)
}

/// Bind `addr` and serve a freshly seeded stub in the background.
pub async fn spawn(addr: &str) -> anyhow::Result<(SocketAddr, Arc<StubState>)> {
    let state = Arc::new(StubState::seeded());
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let app = router(state.clone());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Workflow stub stopped");
        }
    });

    info!(addr = %local, "Workflow stub listening");
    Ok((local, state))
}

async fn count_requests(State(state): State<Arc<StubState>>, request: Request, next: Next) -> Response {
    state.count_request();
    next.run(request).await
}

/// Process endpoints reject requests carrying neither an Authorization
/// header nor a session cookie.
async fn require_credentials(request: Request, next: Next) -> Response {
    let headers = request.headers();
    if headers.contains_key(header::AUTHORIZATION) || headers.contains_key(header::COOKIE) {
        return next.run(request).await;
    }
    let error = ApiError {
        status: StatusCode::UNAUTHORIZED,
        message: "Authentication required".to_string(),
    };
    error.into_response()
}

#[instrument]
async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "workflow-stub",
        "version": env!("CARGO_PKG_VERSION")
    })))
}
