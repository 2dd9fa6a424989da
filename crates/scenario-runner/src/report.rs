//! Run results and their human-readable summary

use crate::lifecycle::{BrowserRelease, TeardownReport};
use probe_core::{ErrorCategory, HarnessError};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub keyword: String,
    pub text: String,
    pub location: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioStatus {
    Passed,
    Failed,
    /// `before_scenario` failed; no step ran.
    SetupFailed,
}

#[derive(Debug)]
pub struct Failure {
    /// Where it happened: the failing step, or the scenario for setup errors.
    pub location: String,
    pub error: HarnessError,
}

impl Failure {
    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub feature: String,
    pub name: String,
    pub location: String,
    pub status: ScenarioStatus,
    pub steps: Vec<StepOutcome>,
    pub failure: Option<Failure>,
    pub teardown: TeardownReport,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scenarios: Vec<ScenarioOutcome>,
    /// Scenarios excluded by the tag filter.
    pub filtered_out: usize,
    /// Set when a configuration error stopped the run early.
    pub aborted: Option<String>,
}

impl RunSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            scenarios: Vec::new(),
            filtered_out: 0,
            aborted: None,
        }
    }

    fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }

    fn count_steps(&self, status: StepStatus) -> usize {
        self.scenarios
            .iter()
            .flat_map(|s| s.steps.iter())
            .filter(|step| step.status == status)
            .count()
    }

    pub fn passed(&self) -> usize {
        self.count(ScenarioStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(ScenarioStatus::Failed)
    }

    pub fn setup_failed(&self) -> usize {
        self.count(ScenarioStatus::SetupFailed)
    }

    pub fn steps_passed(&self) -> usize {
        self.count_steps(StepStatus::Passed)
    }

    pub fn steps_failed(&self) -> usize {
        self.count_steps(StepStatus::Failed)
    }

    pub fn steps_skipped(&self) -> usize {
        self.count_steps(StepStatus::Skipped)
    }

    pub fn cleanup_failures(&self) -> usize {
        self.scenarios
            .iter()
            .map(|s| s.teardown.cleanup.failures.len())
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.scenarios.iter().all(ScenarioOutcome::passed)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failing: Vec<&ScenarioOutcome> = self.scenarios.iter().filter(|s| !s.passed()).collect();
        if !failing.is_empty() {
            writeln!(f, "Failures:")?;
            for scenario in failing {
                writeln!(f, "  {} / {} ({})", scenario.feature, scenario.name, scenario.location)?;
                if let Some(failure) = &scenario.failure {
                    writeln!(f, "    {}: {}", failure.location, failure.error)?;
                }
            }
            writeln!(f)?;
        }

        for scenario in &self.scenarios {
            for failure in &scenario.teardown.cleanup.failures {
                writeln!(f, "cleanup: {} ({})", failure.entry, failure.reason)?;
            }
            if let BrowserRelease::Failed { resource, reason } = &scenario.teardown.browser {
                writeln!(f, "cleanup: {resource} ({reason})")?;
            }
        }

        if let Some(reason) = &self.aborted {
            writeln!(f, "Run aborted: {reason}")?;
        }

        write!(
            f,
            "{} scenarios ({} passed, {} failed, {} setup failed",
            self.scenarios.len(),
            self.passed(),
            self.failed(),
            self.setup_failed()
        )?;
        if self.filtered_out > 0 {
            write!(f, ", {} filtered out", self.filtered_out)?;
        }
        writeln!(f, ")")?;
        write!(
            f,
            "{} steps ({} passed, {} failed, {} skipped)",
            self.steps_passed() + self.steps_failed() + self.steps_skipped(),
            self.steps_passed(),
            self.steps_failed(),
            self.steps_skipped()
        )
    }
}
