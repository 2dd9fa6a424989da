//! # Scenario runner
//!
//! Loads feature files, runs each selected scenario against a fresh
//! [`probe_core::Context`], and guarantees teardown whatever the outcome.
//!
//! ```text
//! load_features -> Runner::preflight -> for each scenario:
//!     before_scenario -> dispatch steps -> after_scenario
//! ```

pub mod cleanup;
pub mod feature;
pub mod lifecycle;
pub mod report;
pub mod runner;
pub mod tags;

pub use cleanup::{deactivate_all, CleanupFailure, CleanupReport};
pub use feature::{load_feature, load_features, parse_feature, Feature, Scenario};
pub use lifecycle::{BrowserRelease, LifecycleManager, TeardownReport, AUTHENTICATION_TAG};
pub use report::{Failure, RunSummary, ScenarioOutcome, ScenarioStatus, StepOutcome, StepStatus};
pub use runner::Runner;
pub use tags::TagFilter;
