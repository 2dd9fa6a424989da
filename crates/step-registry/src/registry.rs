//! Step registry: registration-time conflict checks and run-time dispatch

use crate::args::{StepArgs, StepLine};
use crate::pattern::StepPattern;
use futures::future::BoxFuture;
use probe_core::{HarnessError, Result};
use std::fmt;
use tracing::{debug, instrument};

pub type StepFuture<'a> = BoxFuture<'a, Result<()>>;

/// A step handler. Handlers receive the scenario world and the parsed
/// arguments, and return a boxed future borrowing the world.
pub type StepFn<W> = for<'a> fn(&'a mut W, StepArgs) -> StepFuture<'a>;

struct StepDefinition<W> {
    pattern: StepPattern,
    handler: StepFn<W>,
    needs_table: bool,
}

/// A step line resolved to its unique definition.
pub struct Resolved<'r, W> {
    definition: &'r StepDefinition<W>,
    args: StepArgs,
}

impl<W> Resolved<'_, W> {
    pub fn pattern(&self) -> &str {
        self.definition.pattern.as_str()
    }

    pub fn args(&self) -> &StepArgs {
        &self.args
    }
}

/// Registered step patterns for a world type `W`.
///
/// At most one pattern may match any step line. Conflicts that can be seen
/// from the patterns alone are rejected by [`StepRegistry::step`]; the rest
/// are found by [`StepRegistry::check`] before a run starts.
pub struct StepRegistry<W> {
    definitions: Vec<StepDefinition<W>>,
}

impl<W> fmt::Debug for StepRegistry<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}

impl<W> Default for StepRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> StepRegistry<W> {
    pub fn new() -> Self {
        Self {
            definitions: Vec::new(),
        }
    }

    pub fn step(&mut self, pattern: &str, handler: StepFn<W>) -> Result<&mut Self> {
        self.register(pattern, handler, false)
    }

    /// Register a step that must be followed by a data table.
    pub fn table_step(&mut self, pattern: &str, handler: StepFn<W>) -> Result<&mut Self> {
        self.register(pattern, handler, true)
    }

    fn register(&mut self, pattern: &str, handler: StepFn<W>, needs_table: bool) -> Result<&mut Self> {
        let pattern = StepPattern::compile(pattern)?;
        if let Some(existing) = self
            .definitions
            .iter()
            .find(|definition| definition.pattern.overlaps(&pattern))
        {
            return Err(HarnessError::AmbiguousPattern {
                pattern: pattern.as_str().to_string(),
                conflicting: existing.pattern.as_str().to_string(),
            });
        }
        debug!(pattern = pattern.as_str(), "Step registered");
        self.definitions.push(StepDefinition {
            pattern,
            handler,
            needs_table,
        });
        Ok(self)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|definition| definition.pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Find the unique definition for `step` and parse its arguments.
    pub fn resolve(&self, step: &StepLine) -> Result<Resolved<'_, W>> {
        let mut matches = self
            .definitions
            .iter()
            .filter_map(|definition| definition.pattern.parse(&step.text).map(|params| (definition, params)));

        let (definition, params) = matches.next().ok_or_else(|| HarnessError::UnmatchedStep {
            line: step.text.clone(),
            location: step.location.clone(),
        })?;

        let others: Vec<&str> = matches.map(|(other, _)| other.pattern.as_str()).collect();
        if !others.is_empty() {
            let mut patterns = vec![definition.pattern.as_str().to_string()];
            patterns.extend(others.into_iter().map(str::to_owned));
            return Err(HarnessError::AmbiguousStep {
                line: step.text.clone(),
                location: step.location.clone(),
                patterns,
            });
        }

        if definition.needs_table && step.table.is_none() {
            return Err(HarnessError::MissingTable {
                pattern: definition.pattern.as_str().to_string(),
            });
        }

        let args = StepArgs::new(definition.pattern.as_str(), params?)
            .with_table(step.table.clone())
            .with_docstring(step.docstring.clone());
        Ok(Resolved { definition, args })
    }

    /// Resolve every line up front; returns every problem found.
    pub fn check<'a, I>(&self, steps: I) -> std::result::Result<(), Vec<HarnessError>>
    where
        I: IntoIterator<Item = &'a StepLine>,
    {
        let problems: Vec<HarnessError> = steps
            .into_iter()
            .filter_map(|step| self.resolve(step).err())
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    #[instrument(skip(self, world, step), fields(text = %step.text, location = %step.location))]
    pub async fn dispatch(&self, world: &mut W, step: &StepLine) -> Result<()> {
        let resolved = self.resolve(step)?;
        debug!(pattern = resolved.pattern(), "Dispatching step");
        (resolved.definition.handler)(world, resolved.args).await
    }
}
