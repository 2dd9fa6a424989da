use async_trait::async_trait;
use cucumber::{gherkin::Step, given, then, when, World};
use probe_core::{
    endpoints, AuthOutcome, Authenticator, Context, HarnessError, LoginCredentials, ProbeConfig, ResourceKind,
    ScenarioResource, SessionCredential,
};
use scenario_runner::{
    parse_feature, BrowserRelease, Feature, LifecycleManager, RunSummary, Runner, ScenarioStatus, TagFilter,
};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use step_registry::{StepArgs, StepFuture, StepRegistry};
use workflow_stub::StubState;

fn create_form_version(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let version = args.string(0)?;
        let key = args.string(1)?;
        let url = ctx.api_url(&endpoints::form_versions(&key));
        let body = json!({"name": key, "version": version, "definition": {"fields": []}});
        let response = ctx.session.post_json(&url, &body).await?;
        ctx.track_if_created(&response, ResourceKind::FormVersion, &key, &version);
        ctx.remember(response);
        Ok(())
    })
}

fn status_is(ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected = args.int(0)?;
        let actual = i64::from(ctx.response()?.status_code());
        probe_core::AssertionFailure::ensure(actual == expected, || {
            format!("response status: expected {expected}, got {actual}")
        })?;
        Ok(())
    })
}

fn nothing(_ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async { Ok(()) })
}

fn registry() -> StepRegistry<Context> {
    let mut registry = StepRegistry::new();
    registry
        .step("form version {string} of {string} is created", create_form_version)
        .and_then(|r| r.step("the response status should be {int}", status_is))
        .and_then(|r| r.step("nothing happens", nothing))
        .expect("Test registry should build");
    registry
}

#[derive(Debug, Default)]
struct LaunchCounter {
    launched: AtomicUsize,
    released: AtomicUsize,
}

struct FakeBrowser {
    counter: Arc<LaunchCounter>,
}

#[async_trait]
impl ScenarioResource for FakeBrowser {
    fn describe(&self) -> String {
        "fake browser".to_string()
    }

    async fn release(self: Box<Self>) -> probe_core::Result<()> {
        self.counter.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Counts browser launches; login succeeds unless `reject` is set.
struct CountingAuthenticator {
    counter: Arc<LaunchCounter>,
    reject: bool,
}

#[async_trait]
impl Authenticator for CountingAuthenticator {
    async fn authenticate(&self, _base_url: &str, _credentials: &LoginCredentials) -> AuthOutcome {
        self.counter.launched.fetch_add(1, Ordering::SeqCst);
        let browser: Box<dyn ScenarioResource> = Box::new(FakeBrowser {
            counter: self.counter.clone(),
        });
        if self.reject {
            return AuthOutcome::failed(
                Some(browser),
                HarnessError::SessionCookieMissing {
                    cookie: "JSESSIONID".to_string(),
                },
            );
        }
        AuthOutcome {
            resource: Some(browser),
            credential: Ok(SessionCredential::Cookie {
                name: "JSESSIONID".to_string(),
                value: "fake-session".to_string(),
            }),
        }
    }
}

#[derive(Debug, World)]
#[world(init = Self::new)]
struct RunnerWorld {
    stub: Option<(String, Arc<StubState>)>,
    features: Vec<Feature>,
    counter: Arc<LaunchCounter>,
    reject_logins: bool,
    filter: Option<TagFilter>,
    summary: Option<RunSummary>,
    preflight: Option<Vec<HarnessError>>,
}

impl RunnerWorld {
    fn new() -> Self {
        Self {
            stub: None,
            features: Vec::new(),
            counter: Arc::new(LaunchCounter::default()),
            reject_logins: false,
            filter: None,
            summary: None,
            preflight: None,
        }
    }

    fn stub(&self) -> &StubState {
        &self.stub.as_ref().expect("No workflow stub running").1
    }

    fn summary(&self) -> &RunSummary {
        self.summary.as_ref().expect("Run did not produce a summary")
    }

    fn runner(&self) -> Runner {
        let base_url = self.stub.as_ref().expect("No workflow stub running").0.clone();
        let config = ProbeConfig {
            base_url,
            ..ProbeConfig::default()
        };
        let lifecycle = LifecycleManager::with_authenticator(Arc::new(CountingAuthenticator {
            counter: self.counter.clone(),
            reject: self.reject_logins,
        }));
        let runner = Runner::new(config, registry(), lifecycle);
        match &self.filter {
            Some(filter) => runner.with_filter(filter.clone()),
            None => runner,
        }
    }
}

#[given("a running workflow stub")]
async fn given_running_stub(world: &mut RunnerWorld) {
    let (addr, state) = workflow_stub::spawn("127.0.0.1:0")
        .await
        .expect("Workflow stub should start");
    world.stub = Some((format!("http://{addr}"), state));
}

#[given("the feature file:")]
async fn given_feature_file(world: &mut RunnerWorld, step: &Step) {
    let source = step.docstring.as_ref().expect("Step should carry a doc string");
    let feature = parse_feature(Path::new("fixture.feature"), source).expect("Fixture feature should parse");
    world.features.push(feature);
}

#[given(expr = "deprecating {string} version {string} fails")]
async fn given_deprecation_fails(world: &mut RunnerWorld, key: String, version: String) {
    world.stub().fail_deprecation(&key, &version);
}

#[given("the identity provider rejects every login")]
async fn given_logins_rejected(world: &mut RunnerWorld) {
    world.reject_logins = true;
}

#[given(expr = "only scenarios matching {string} are selected")]
async fn given_filter(world: &mut RunnerWorld, expression: String) {
    world.filter = Some(TagFilter::parse([expression]).expect("Tag expression should parse"));
}

#[when("the runner runs the features")]
async fn when_runner_runs(world: &mut RunnerWorld) {
    match world.runner().run(&world.features).await {
        Ok(summary) => world.summary = Some(summary),
        Err(problems) => world.preflight = Some(problems),
    }
}

#[then(expr = "{int} scenario(s) passed and {int} failed")]
async fn then_counts(world: &mut RunnerWorld, passed: usize, failed: usize) {
    let summary = world.summary();
    assert_eq!((summary.passed(), summary.failed()), (passed, failed), "{summary}");
}

#[then(expr = "scenario {int} failed setup")]
async fn then_setup_failed(world: &mut RunnerWorld, index: usize) {
    assert_eq!(world.summary().scenarios[index - 1].status, ScenarioStatus::SetupFailed);
}

#[then(expr = "the stub received {int} deprecation call(s) for {string} version {string}")]
async fn then_deprecation_calls(world: &mut RunnerWorld, count: usize, key: String, version: String) {
    assert_eq!(world.stub().deprecation_calls(&key, &version), count);
}

#[then(expr = "the run reports {int} cleanup failure(s)")]
async fn then_cleanup_failures(world: &mut RunnerWorld, count: usize) {
    assert_eq!(world.summary().cleanup_failures(), count);
}

#[then("no browser was launched")]
async fn then_no_browser(world: &mut RunnerWorld) {
    assert_eq!(world.counter.launched.load(Ordering::SeqCst), 0);
    for scenario in &world.summary().scenarios {
        assert_eq!(scenario.teardown.browser, BrowserRelease::NotAcquired);
    }
}

#[then(expr = "{int} browser(s) was/were launched and {int} released")]
async fn then_browsers(world: &mut RunnerWorld, launched: usize, released: usize) {
    assert_eq!(world.counter.launched.load(Ordering::SeqCst), launched);
    assert_eq!(world.counter.released.load(Ordering::SeqCst), released);
}

#[then(expr = "preflight reports an unmatched step at {string}")]
async fn then_preflight_unmatched(world: &mut RunnerWorld, expected: String) {
    let problems = world.preflight.as_ref().expect("Preflight should have failed");
    assert!(
        problems
            .iter()
            .any(|p| matches!(p, HarnessError::UnmatchedStep { location, .. } if *location == expected)),
        "problems: {problems:?}"
    );
}

#[then("the stub received no requests")]
async fn then_no_requests(world: &mut RunnerWorld) {
    assert_eq!(world.stub().request_count(), 0);
}

#[tokio::main]
async fn main() {
    RunnerWorld::run("tests/features").await;
}
