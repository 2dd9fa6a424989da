mod support;

use auth_bridge::{AuthBridge, WebDriverLauncher};
use cucumber::{given, then, when, World};
use probe_core::{ApiSession, AuthOutcome, Authenticator, HarnessError, LoginCredentials, SessionCredential, WebDriverSettings};
use std::sync::Arc;
use std::time::Duration;
use support::FakeDriver;

#[derive(Debug, World)]
#[world(init = Self::new)]
struct LoginWorld {
    driver: Option<FakeDriver>,
    outcome: Option<AuthOutcome>,
    session: Option<ApiSession>,
}

impl LoginWorld {
    fn new() -> Self {
        Self {
            driver: None,
            outcome: None,
            session: None,
        }
    }

    fn driver(&self) -> &FakeDriver {
        self.driver.as_ref().expect("No WebDriver endpoint started")
    }

    fn bridge(&self) -> AuthBridge {
        let settings = WebDriverSettings {
            url: Some(self.driver().url.clone()),
            ..WebDriverSettings::default()
        };
        AuthBridge::new(
            Arc::new(WebDriverLauncher::new(settings)),
            "keycloak",
            Duration::from_millis(300),
        )
        .with_poll_interval(Duration::from_millis(20))
    }
}

#[given("a WebDriver endpoint serving the provider login form")]
async fn given_login_form(world: &mut LoginWorld) {
    world.driver = Some(support::spawn(true).await);
}

#[given("a WebDriver endpoint whose login form never renders")]
async fn given_blank_page(world: &mut LoginWorld) {
    world.driver = Some(support::spawn(false).await);
}

#[given(expr = "the provider accepts {string} with password {string}")]
async fn given_accepted_login(world: &mut LoginWorld, username: String, password: String) {
    world.driver().state.lock().accepted = Some((username, password));
}

#[when(expr = "the bridge logs in as {string} with password {string}")]
async fn when_bridge_logs_in(world: &mut LoginWorld, username: String, password: String) {
    let bridge = world.bridge();
    let base_url = world.driver().url.clone();
    let outcome = bridge
        .authenticate(&base_url, &LoginCredentials::new(username, password))
        .await;
    world.outcome = Some(outcome);
}

#[when("the credential is installed into an API session")]
async fn when_credential_installed(world: &mut LoginWorld) {
    let outcome = world.outcome.take().expect("No login attempted");
    let credential = outcome.credential.expect("Login should have succeeded");
    let mut session = ApiSession::new().expect("Failed to build API session");
    session
        .install_credential(&credential, &world.driver().url)
        .expect("Failed to install credential");
    world.session = Some(session);
}

#[then(expr = "the login succeeds with cookie {string}")]
async fn then_login_succeeds(world: &mut LoginWorld, cookie: String) {
    let outcome = world.outcome.as_ref().expect("No login attempted");
    match &outcome.credential {
        Ok(SessionCredential::Cookie { name, value }) => {
            assert_eq!(name, &cookie);
            assert_eq!(value, support::SESSION_COOKIE_VALUE);
        }
        other => panic!("Expected a session cookie, got {:?}", other),
    }
}

#[then(expr = "the browser visited {string}")]
async fn then_browser_visited(world: &mut LoginWorld, path: String) {
    let expected = format!("{}{}", world.driver().url, path);
    assert_eq!(world.driver().state.lock().visited, vec![expected]);
}

#[then(expr = "the browser was started with {string}")]
async fn then_browser_argument(world: &mut LoginWorld, argument: String) {
    let state = world.driver().state.lock();
    assert!(
        state.chrome_args.contains(&argument),
        "Chrome arguments {:?} should contain {}",
        state.chrome_args,
        argument
    );
}

#[then("the login fails with a login page timeout")]
async fn then_login_times_out(world: &mut LoginWorld) {
    let outcome = world.outcome.as_ref().expect("No login attempted");
    assert!(
        matches!(outcome.credential, Err(HarnessError::LoginPageTimeout { .. })),
        "Expected a login page timeout, got {:?}",
        outcome.credential
    );
}

#[then("the login fails because the session cookie is missing")]
async fn then_cookie_missing(world: &mut LoginWorld) {
    let outcome = world.outcome.as_ref().expect("No login attempted");
    assert!(
        matches!(outcome.credential, Err(HarnessError::SessionCookieMissing { .. })),
        "Expected a missing session cookie, got {:?}",
        outcome.credential
    );
}

#[then("releasing the browser deletes its session")]
async fn then_release_deletes_session(world: &mut LoginWorld) {
    let outcome = world.outcome.take().expect("No login attempted");
    let browser = outcome.resource.expect("Browser should be handed back on failure");
    browser.release().await.expect("Failed to release browser");

    let state = world.driver().state.lock();
    assert_eq!(state.sessions_created, 1);
    assert_eq!(state.sessions_deleted, 1);
}

#[then(expr = "a request through that session carries {string}")]
async fn then_session_carries_cookie(world: &mut LoginWorld, expected: String) {
    let session = world.session.as_ref().expect("No API session");
    let response = session
        .get(&format!("{}/whoami", world.driver().url))
        .await
        .expect("Request failed");
    assert_eq!(response.field_text("cookie").as_deref(), Some(expected.as_str()));
}

#[tokio::main]
async fn main() {
    LoginWorld::run("tests/features").await;
}
