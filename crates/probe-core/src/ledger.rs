//! Record of the resources a scenario created

use crate::endpoints;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A form version; `key` is the form key.
    FormVersion,
    /// A process definition version; `key` is the definition id.
    ProcessVersion,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::FormVersion => write!(f, "form version"),
            ResourceKind::ProcessVersion => write!(f, "process version"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: ResourceKind,
    /// API root the resource was created under; cleanup goes back there.
    pub api_root: String,
    pub key: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

/// The request that deactivates a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deactivation {
    pub method: Method,
    pub url: String,
}

impl LedgerEntry {
    pub fn new(
        kind: ResourceKind,
        api_root: impl Into<String>,
        key: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            api_root: api_root.into(),
            key: key.into(),
            version: version.into(),
            created_at: Utc::now(),
        }
    }

    pub fn deactivation(&self) -> Deactivation {
        let api_root = &self.api_root;
        match self.kind {
            ResourceKind::FormVersion => Deactivation {
                method: Method::POST,
                url: format!(
                    "{api_root}{}",
                    endpoints::deprecate_form_version(&self.key, &self.version)
                ),
            },
            ResourceKind::ProcessVersion => Deactivation {
                method: Method::DELETE,
                url: format!(
                    "{api_root}{}",
                    endpoints::active_process_version(&self.key, &self.version)
                ),
            },
        }
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.key, self.version)
    }
}

/// Append-only during a scenario, drained once at teardown.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    entries: Vec<LedgerEntry>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: LedgerEntry) {
        tracing::debug!(kind = %entry.kind, key = %entry.key, version = %entry.version, "Ledger entry recorded");
        self.entries.push(entry);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Take every entry in creation order, leaving the ledger empty.
    pub fn drain(&mut self) -> Vec<LedgerEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
