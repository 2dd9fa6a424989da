//! `{name}` substitution in endpoint text taken from scenario steps

use std::collections::BTreeMap;

/// Named values available to endpoint templates.
///
/// A name that is registered but has no value substitutes the empty string;
/// names that were never registered are left untouched.
#[derive(Debug, Default, Clone)]
pub struct PathSlots {
    slots: BTreeMap<&'static str, Option<String>>,
}

impl PathSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: Option<&str>) -> Self {
        self.slots.insert(name, value.map(str::to_owned));
        self
    }
}

pub fn substitute(template: &str, slots: &PathSlots) -> String {
    let mut resolved = template.to_string();
    for (name, value) in &slots.slots {
        let placeholder = format!("{{{name}}}");
        if !resolved.contains(&placeholder) {
            continue;
        }
        if value.is_none() {
            tracing::debug!(placeholder = %name, "No scenario value for placeholder, substituting empty string");
        }
        resolved = resolved.replace(&placeholder, value.as_deref().unwrap_or(""));
    }
    resolved
}
