//! Sequential scenario execution

use crate::feature::{Feature, Scenario};
use crate::lifecycle::{BrowserRelease, LifecycleManager, TeardownReport};
use crate::report::{Failure, RunSummary, ScenarioOutcome, ScenarioStatus, StepOutcome, StepStatus};
use crate::tags::TagFilter;
use futures::FutureExt;
use probe_core::{Context, ErrorCategory, HarnessError, ProbeConfig, Result};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use step_registry::{StepLine, StepRegistry};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs scenarios one at a time against a fresh [`Context`] each.
pub struct Runner {
    config: ProbeConfig,
    registry: StepRegistry<Context>,
    lifecycle: LifecycleManager,
    filter: TagFilter,
}

impl Runner {
    pub fn new(config: ProbeConfig, registry: StepRegistry<Context>, lifecycle: LifecycleManager) -> Self {
        Self {
            config,
            registry,
            lifecycle,
            filter: TagFilter::all(),
        }
    }

    pub fn with_filter(mut self, filter: TagFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn registry(&self) -> &StepRegistry<Context> {
        &self.registry
    }

    /// Resolve every step of every loaded scenario without running anything.
    pub fn preflight(&self, features: &[Feature]) -> std::result::Result<(), Vec<HarnessError>> {
        self.registry.check(features.iter().flat_map(Feature::steps))
    }

    /// Preflight, then run every selected scenario.
    ///
    /// Returns the preflight problems when any step line does not resolve;
    /// in that case no scenario has started and no request has been sent.
    pub async fn run(&self, features: &[Feature]) -> std::result::Result<RunSummary, Vec<HarnessError>> {
        if let Err(problems) = self.preflight(features) {
            error!(problems = problems.len(), "Step preflight failed");
            return Err(problems);
        }

        let run_id = Uuid::new_v4();
        let mut summary = RunSummary::new(run_id);
        info!(%run_id, features = features.len(), filter = %self.filter, "Starting run");

        'features: for feature in features {
            for scenario in &feature.scenarios {
                if !self.filter.matches(&scenario.tags) {
                    summary.filtered_out += 1;
                    continue;
                }

                let span = info_span!(
                    "scenario",
                    feature = %feature.name,
                    scenario = %scenario.name,
                    %run_id
                );
                let outcome = self.run_scenario(feature, scenario).instrument(span).await;

                let abort = outcome
                    .failure
                    .as_ref()
                    .filter(|failure| failure.category() == ErrorCategory::Configuration)
                    .map(|failure| failure.error.to_string());
                summary.scenarios.push(outcome);
                if let Some(reason) = abort {
                    error!(reason = %reason, "Configuration error, aborting run");
                    summary.aborted = Some(reason);
                    break 'features;
                }
            }
        }

        info!(
            passed = summary.passed(),
            failed = summary.failed(),
            setup_failed = summary.setup_failed(),
            "Run finished"
        );
        Ok(summary)
    }

    async fn run_scenario(&self, feature: &Feature, scenario: &Scenario) -> ScenarioOutcome {
        let mut outcome = ScenarioOutcome {
            feature: feature.name.clone(),
            name: scenario.name.clone(),
            location: scenario.location.clone(),
            status: ScenarioStatus::Passed,
            steps: Vec::with_capacity(scenario.steps.len()),
            failure: None,
            teardown: TeardownReport {
                cleanup: Default::default(),
                browser: BrowserRelease::NotAcquired,
            },
        };

        let mut ctx = match Context::new(&self.config) {
            Ok(ctx) => ctx,
            Err(e) => {
                outcome.status = ScenarioStatus::SetupFailed;
                outcome.steps = scenario.steps.iter().map(|s| step_outcome(s, StepStatus::Skipped)).collect();
                outcome.failure = Some(Failure {
                    location: scenario.location.clone(),
                    error: e,
                });
                return outcome;
            }
        };

        let setup = guarded(self.lifecycle.before_scenario(&mut ctx, &scenario.tags)).await;
        if let Err(e) = setup {
            warn!(error = %e, "Scenario setup failed");
            outcome.status = ScenarioStatus::SetupFailed;
            outcome.failure = Some(Failure {
                location: scenario.location.clone(),
                error: e,
            });
        }

        for step in &scenario.steps {
            if outcome.failure.is_some() {
                outcome.steps.push(step_outcome(step, StepStatus::Skipped));
                continue;
            }
            match guarded(self.registry.dispatch(&mut ctx, step)).await {
                Ok(()) => outcome.steps.push(step_outcome(step, StepStatus::Passed)),
                Err(e) => {
                    warn!(location = %step.location, error = %e, "Step failed");
                    outcome.steps.push(step_outcome(step, StepStatus::Failed));
                    outcome.status = ScenarioStatus::Failed;
                    outcome.failure = Some(Failure {
                        location: step.location.clone(),
                        error: e,
                    });
                }
            }
        }

        outcome.teardown = self.lifecycle.after_scenario(ctx).await;
        info!(status = ?outcome.status, cleaned = outcome.teardown.cleanup.attempted, "Scenario finished");
        outcome
    }
}

fn step_outcome(step: &StepLine, status: StepStatus) -> StepOutcome {
    StepOutcome {
        keyword: step.keyword.clone(),
        text: step.text.clone(),
        location: step.location.clone(),
        status,
    }
}

/// Await `future`, turning a panic into [`HarnessError::Panicked`].
async fn guarded<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(HarnessError::Panicked {
            message: panic_message(&*panic),
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::parse_feature;
    use probe_core::AssertionFailure;
    use std::path::Path;
    use step_registry::{StepArgs, StepFuture};

    fn pass(_ctx: &mut Context, _args: StepArgs) -> StepFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    fn fail(_ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
        Box::pin(async move { Err(AssertionFailure::mismatch("value", args.int(0)?, 0).into()) })
    }

    fn explode(_ctx: &mut Context, args: StepArgs) -> StepFuture<'_> {
        Box::pin(async move {
            if args.params().is_empty() {
                panic!("handler exploded");
            }
            Ok(())
        })
    }

    fn runner() -> Runner {
        let mut registry = StepRegistry::new();
        registry
            .step("a passing step", pass)
            .unwrap()
            .step("a step expecting {int}", fail)
            .unwrap()
            .step("a panicking step", explode)
            .unwrap();
        Runner::new(ProbeConfig::default(), registry, LifecycleManager::new())
    }

    fn feature(source: &str) -> Feature {
        parse_feature(Path::new("runner.feature"), source).unwrap()
    }

    #[tokio::test]
    async fn test_failure_skips_remaining_steps_but_not_later_scenarios() {
        let features = [feature(
            "Feature: f\n  Scenario: a\n    Given a step expecting 3\n    Then a passing step\n  Scenario: b\n    Given a passing step\n",
        )];

        let summary = runner().run(&features).await.unwrap();

        assert_eq!((summary.passed(), summary.failed()), (1, 1));
        let first = &summary.scenarios[0];
        assert_eq!(first.steps[1].status, StepStatus::Skipped);
        assert_eq!(first.failure.as_ref().unwrap().location, "runner.feature:3");
        assert!(summary.aborted.is_none());
    }

    #[tokio::test]
    async fn test_panicking_step_is_reported_and_torn_down() {
        let features = [feature("Feature: f\n  Scenario: boom\n    Given a panicking step\n")];

        let summary = runner().run(&features).await.unwrap();

        let failure = summary.scenarios[0].failure.as_ref().unwrap();
        assert!(matches!(&failure.error, HarnessError::Panicked { message } if message == "handler exploded"));
        assert_eq!(failure.category(), ErrorCategory::Unexpected);
    }

    #[tokio::test]
    async fn test_unresolved_steps_stop_the_run_before_it_starts() {
        let features = [feature("Feature: f\n  Scenario: a\n    Given a passing step\n    And nobody wrote this step\n")];

        let problems = runner().run(&features).await.unwrap_err();

        assert_eq!(problems.len(), 1);
        assert!(matches!(&problems[0], HarnessError::UnmatchedStep { location, .. } if location == "runner.feature:4"));
    }

    #[tokio::test]
    async fn test_tag_filter_counts_excluded_scenarios() {
        let features = [feature(
            "Feature: f\n  @wip\n  Scenario: a\n    Given a passing step\n  Scenario: b\n    Given a passing step\n",
        )];

        let summary = runner()
            .with_filter(TagFilter::parse(["not @wip"]).unwrap())
            .run(&features)
            .await
            .unwrap();

        assert_eq!(summary.scenarios.len(), 1);
        assert_eq!(summary.filtered_out, 1);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_authentication_without_authenticator_fails_setup_only() {
        let features = [feature(
            "Feature: f\n  @authentication\n  Scenario: a\n    Given a passing step\n  Scenario: b\n    Given a passing step\n",
        )];

        let summary = runner().run(&features).await.unwrap();

        assert_eq!(summary.scenarios[0].status, ScenarioStatus::SetupFailed);
        assert_eq!(summary.scenarios[0].steps[0].status, StepStatus::Skipped);
        assert!(summary.scenarios[1].passed());
    }
}
