//! In-process WebDriver endpoint that renders a fake provider login form.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const SESSION_COOKIE_VALUE: &str = "fake-session";
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735c6d8f3c";
const FORM_IDS: [&str; 3] = ["username", "password", "kc-login"];

#[derive(Debug, Default)]
pub struct DriverState {
    pub form_renders: bool,
    pub accepted: Option<(String, String)>,
    pub chrome_args: Vec<String>,
    pub visited: Vec<String>,
    pub typed: HashMap<String, String>,
    pub cookie: Option<String>,
    pub sessions_created: usize,
    pub sessions_deleted: usize,
}

#[derive(Debug, Clone)]
pub struct FakeDriver {
    pub url: String,
    pub state: Arc<Mutex<DriverState>>,
}

type Shared = Arc<Mutex<DriverState>>;
type Reply = (StatusCode, Json<Value>);

fn ok(value: Value) -> Reply {
    (StatusCode::OK, Json(json!({ "value": value })))
}

fn not_found(error: &str) -> Reply {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "value": { "error": error, "message": error, "stacktrace": "" } })),
    )
}

async fn status() -> Reply {
    ok(json!({ "ready": true, "message": "fake driver" }))
}

async fn new_session(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut state = state.lock();
    state.sessions_created += 1;
    state.chrome_args = body["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
        .as_array()
        .map(|args| args.iter().filter_map(|a| a.as_str().map(str::to_owned)).collect())
        .unwrap_or_default();
    ok(json!({ "sessionId": format!("s-{}", state.sessions_created), "capabilities": {} }))
}

async fn navigate(State(state): State<Shared>, Path(_session): Path<String>, Json(body): Json<Value>) -> Reply {
    let url = body["url"].as_str().unwrap_or_default().to_string();
    state.lock().visited.push(url);
    ok(Value::Null)
}

async fn find_element(State(state): State<Shared>, Path(_session): Path<String>, Json(body): Json<Value>) -> Reply {
    let selector = body["value"].as_str().unwrap_or_default();
    let id = selector
        .trim_start_matches("[id=\"")
        .trim_end_matches("\"]")
        .to_string();
    if state.lock().form_renders && FORM_IDS.contains(&id.as_str()) {
        ok(json!({ ELEMENT_KEY: id }))
    } else {
        not_found("no such element")
    }
}

async fn send_keys(
    State(state): State<Shared>,
    Path((_session, element)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    state.lock().typed.insert(element, text);
    ok(Value::Null)
}

async fn click(State(state): State<Shared>, Path((_session, _element)): Path<(String, String)>) -> Reply {
    let mut state = state.lock();
    let submitted = (
        state.typed.get("username").cloned().unwrap_or_default(),
        state.typed.get("password").cloned().unwrap_or_default(),
    );
    if state.accepted.as_ref() == Some(&submitted) {
        state.cookie = Some(SESSION_COOKIE_VALUE.to_string());
    }
    ok(Value::Null)
}

async fn cookie(State(state): State<Shared>, Path((_session, name)): Path<(String, String)>) -> Reply {
    match state.lock().cookie.clone() {
        Some(value) if name == "JSESSIONID" => ok(json!({ "name": name, "value": value })),
        _ => not_found("no such cookie"),
    }
}

async fn delete_session(State(state): State<Shared>, Path(_session): Path<String>) -> Reply {
    state.lock().sessions_deleted += 1;
    ok(Value::Null)
}

/// Echoes the Cookie header so tests can see what an API session presents.
async fn whoami(headers: HeaderMap) -> Json<Value> {
    let cookie = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({ "cookie": cookie }))
}

pub async fn spawn(form_renders: bool) -> FakeDriver {
    let state = Arc::new(Mutex::new(DriverState {
        form_renders,
        ..DriverState::default()
    }));
    let app = Router::new()
        .route("/status", get(status))
        .route("/session", post(new_session))
        .route("/session/{session}", delete(delete_session))
        .route("/session/{session}/url", post(navigate))
        .route("/session/{session}/element", post(find_element))
        .route("/session/{session}/element/{element}/value", post(send_keys))
        .route("/session/{session}/element/{element}/click", post(click))
        .route("/session/{session}/cookie/{name}", get(cookie))
        .route("/whoami", get(whoami))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeDriver {
        url: format!("http://{addr}"),
        state,
    }
}
