//! Stored resources, seeded fixtures and test hooks

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub const SEED_BPMN: &str = "<bpmn>...</bpmn>";

#[derive(Debug, Clone, Serialize)]
pub struct Form {
    pub id: u64,
    pub name: String,
    pub version: String,
    pub definition: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormVersion {
    pub id: u64,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub definition: Value,
    pub published_date: i64,
    pub deprecated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    Draft,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVersion {
    pub id: String,
    pub version: String,
    pub status: VersionStatus,
    pub bpmn_xml: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinition {
    pub id: String,
    pub name: String,
    pub key: String,
    pub bpmn_xml: String,
    #[serde(skip)]
    pub versions: Vec<ProcessVersion>,
}

impl ProcessDefinition {
    pub fn has_active_version(&self) -> bool {
        self.versions.iter().any(|v| v.status == VersionStatus::Active)
    }

    /// Find a version by its id or by its version label.
    pub fn version_mut(&mut self, id_or_label: &str) -> Option<&mut ProcessVersion> {
        self.versions
            .iter_mut()
            .find(|v| v.id == id_or_label || v.version == id_or_label)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    pub instance_id: String,
    pub definition_id: String,
    pub status: String,
    pub start_time: String,
    #[serde(skip)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Default)]
struct Counters {
    deprecations: HashMap<(String, String), usize>,
    undeployments: HashMap<(String, String), usize>,
}

/// Everything the stub knows, shared by all handlers.
#[derive(Debug, Default)]
pub struct StubState {
    pub(crate) forms: DashMap<u64, Form>,
    pub(crate) form_versions: DashMap<String, Vec<FormVersion>>,
    pub(crate) definitions: DashMap<String, ProcessDefinition>,
    pub(crate) instances: DashMap<String, ProcessInstance>,
    failing_deprecations: DashSet<(String, String)>,
    counters: Mutex<Counters>,
    next_id: AtomicU64,
    next_form_id: AtomicU64,
    requests: AtomicUsize,
}

impl StubState {
    /// A state holding the fixture definitions and instances scenarios refer to.
    pub fn seeded() -> Self {
        let state = Self::default();

        state.insert_definition("test_definition", "Test Process", "test_process", vec![]);
        state.insert_definition(
            "versioned_definition",
            "Versioned Process",
            "versioned_process",
            vec![seed_version(VersionStatus::Active)],
        );
        state.insert_definition(
            "inactive_definition",
            "Inactive Process",
            "inactive_process",
            vec![seed_version(VersionStatus::Inactive)],
        );
        state.insert_definition(
            "active_definition",
            "Active Process",
            "active_process",
            vec![seed_version(VersionStatus::Active)],
        );

        state.insert_instance("test_instance", "active_definition", vec![]);
        state.insert_instance(
            "task_instance",
            "active_definition",
            vec![Task {
                task_id: "incomplete_task".to_string(),
                name: "Review request".to_string(),
                status: "INCOMPLETE".to_string(),
            }],
        );

        state
    }

    fn insert_definition(&self, id: &str, name: &str, key: &str, versions: Vec<ProcessVersion>) {
        self.definitions.insert(
            id.to_string(),
            ProcessDefinition {
                id: id.to_string(),
                name: name.to_string(),
                key: key.to_string(),
                bpmn_xml: SEED_BPMN.to_string(),
                versions,
            },
        );
    }

    fn insert_instance(&self, id: &str, definition_id: &str, tasks: Vec<Task>) {
        self.instances.insert(
            id.to_string(),
            ProcessInstance {
                instance_id: id.to_string(),
                definition_id: definition_id.to_string(),
                status: "ACTIVE".to_string(),
                start_time: Utc::now().to_rfc3339(),
                tasks,
            },
        );
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Forms are numbered on their own, starting at 1.
    pub(crate) fn next_form_id(&self) -> u64 {
        self.next_form_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn count_request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_deprecation(&self, key: &str, version: &str) {
        *self
            .counters
            .lock()
            .deprecations
            .entry((key.to_string(), version.to_string()))
            .or_default() += 1;
    }

    pub(crate) fn record_undeployment(&self, definition_id: &str, version_id: &str) {
        *self
            .counters
            .lock()
            .undeployments
            .entry((definition_id.to_string(), version_id.to_string()))
            .or_default() += 1;
    }

    pub(crate) fn deprecation_fails(&self, key: &str, version: &str) -> bool {
        self.failing_deprecations
            .contains(&(key.to_string(), version.to_string()))
    }

    /// Make every later deprecation of `key`/`version` answer 500.
    pub fn fail_deprecation(&self, key: &str, version: &str) {
        self.failing_deprecations
            .insert((key.to_string(), version.to_string()));
    }

    /// Deprecation calls received for `key`/`version`, failed ones included.
    pub fn deprecation_calls(&self, key: &str, version: &str) -> usize {
        self.counters
            .lock()
            .deprecations
            .get(&(key.to_string(), version.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Undeploy calls received for a process definition version.
    pub fn undeploy_calls(&self, definition_id: &str, version_id: &str) -> usize {
        self.counters
            .lock()
            .undeployments
            .get(&(definition_id.to_string(), version_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Requests received under the API prefix.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn form_version(&self, key: &str, version: &str) -> Option<FormVersion> {
        self.form_versions
            .get(key)?
            .iter()
            .find(|v| v.version == version)
            .cloned()
    }

    pub fn process_version_status(&self, definition_id: &str, id_or_label: &str) -> Option<VersionStatus> {
        self.definitions
            .get_mut(definition_id)?
            .version_mut(id_or_label)
            .map(|v| v.status)
    }
}

fn seed_version(status: VersionStatus) -> ProcessVersion {
    ProcessVersion {
        id: "v1".to_string(),
        version: "1.0".to_string(),
        status,
        bpmn_xml: SEED_BPMN.to_string(),
    }
}
