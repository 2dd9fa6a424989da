//! Tag expressions for selecting scenarios

use cucumber::tag::Ext as _;
use gherkin::tagexpr::TagOperation;
use probe_core::{HarnessError, Result};
use std::fmt;

/// Gherkin tag expressions (`@forms or @process`, `not @wip`); every
/// expression given must hold for a scenario to be selected.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    expressions: Vec<(String, TagOperation)>,
}

impl TagFilter {
    /// A filter that selects everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse<I, S>(expressions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expressions = expressions
            .into_iter()
            .map(|expression| {
                let expression = expression.as_ref().trim();
                expression
                    .parse::<TagOperation>()
                    .map(|operation| (expression.to_string(), operation))
                    .map_err(|e| HarnessError::config(format!("invalid tag expression `{expression}`: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { expressions })
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// `tags` are names without the leading `@`.
    pub fn matches(&self, tags: &[String]) -> bool {
        self.expressions
            .iter()
            .all(|(_, operation)| operation.eval(tags.iter()))
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expressions: Vec<String> = self
            .expressions
            .iter()
            .map(|(expression, _)| format!("({expression})"))
            .collect();
        write!(f, "{}", expressions.join(" and "))
    }
}
