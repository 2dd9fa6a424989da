//! Error types for the flowprobe harness

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("step pattern `{pattern}` is ambiguous with `{conflicting}`")]
    AmbiguousPattern { pattern: String, conflicting: String },

    #[error("step pattern `{pattern}` is invalid: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("{location}: no step matches `{line}`")]
    UnmatchedStep { line: String, location: String },

    #[error("{location}: step `{line}` matches several patterns: {}", .patterns.join(" | "))]
    AmbiguousStep {
        line: String,
        location: String,
        patterns: Vec<String>,
    },

    #[error("parameter {index} of `{pattern}` is invalid: {reason}")]
    InvalidParameter {
        pattern: String,
        index: usize,
        reason: String,
    },

    #[error("step `{pattern}` requires a data table")]
    MissingTable { pattern: String },

    #[error("login page at {url} did not show element `{element}` within {timeout:?}")]
    LoginPageTimeout {
        url: String,
        element: String,
        timeout: Duration,
    },

    #[error("session cookie `{cookie}` missing after login submission")]
    SessionCookieMissing { cookie: String },

    #[error("browser automation failed: {reason}")]
    Browser { reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    #[error("scenario has no value for `{slot}`")]
    MissingValue { slot: &'static str },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("step panicked: {message}")]
    Panicked { message: String },

    #[error("cannot read feature file {}: {source}", .path.display())]
    FeatureIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse feature file {}: {reason}", .path.display())]
    FeatureSyntax { path: PathBuf, reason: String },
}

/// How a failure affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Harness misconfiguration; aborts the whole run.
    Configuration,
    /// Scenario setup failed; its steps are skipped, teardown still runs.
    Setup,
    /// An expectation did not hold.
    Assertion,
    /// Anything else a step raised.
    Unexpected,
}

impl HarnessError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HarnessError::AmbiguousPattern { .. }
            | HarnessError::InvalidPattern { .. }
            | HarnessError::UnmatchedStep { .. }
            | HarnessError::AmbiguousStep { .. }
            | HarnessError::InvalidParameter { .. }
            | HarnessError::MissingTable { .. }
            | HarnessError::FeatureIo { .. }
            | HarnessError::FeatureSyntax { .. } => ErrorCategory::Configuration,
            HarnessError::LoginPageTimeout { .. }
            | HarnessError::SessionCookieMissing { .. }
            | HarnessError::Browser { .. }
            | HarnessError::Config { .. } => ErrorCategory::Setup,
            HarnessError::Assertion(_) => ErrorCategory::Assertion,
            HarnessError::MissingValue { .. }
            | HarnessError::Http { .. }
            | HarnessError::Serialization { .. }
            | HarnessError::Panicked { .. } => ErrorCategory::Unexpected,
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        HarnessError::Config {
            reason: reason.into(),
        }
    }

    pub fn browser(reason: impl fmt::Display) -> Self {
        HarnessError::Browser {
            reason: reason.to_string(),
        }
    }
}

/// A failed expectation, rendered with expected/actual detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AssertionFailure {
    pub message: String,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn mismatch(what: &str, expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(format!("{what}: expected {expected}, got {actual}"))
    }

    /// Fails with `message` unless `condition` holds.
    pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> std::result::Result<(), Self> {
        if condition {
            Ok(())
        } else {
            Err(Self::new(message()))
        }
    }
}
