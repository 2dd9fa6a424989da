//! Step pattern compilation
//!
//! Patterns are literal text with typed placeholders:
//! `{string}` (double-quoted), `{int}`, `{float}` and `{word}`.

use crate::args::Param;
use probe_core::{HarnessError, Result};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Int,
    Float,
    Word,
}

impl ParamKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ParamKind::String),
            "int" => Some(ParamKind::Int),
            "float" => Some(ParamKind::Float),
            "word" => Some(ParamKind::Word),
            _ => None,
        }
    }

    fn regex(self) -> &'static str {
        match self {
            ParamKind::String => r#""([^"]*)""#,
            ParamKind::Int => r"(-?\d+)",
            ParamKind::Float => r"(-?\d+(?:\.\d+)?)",
            ParamKind::Word => r"(\S+)",
        }
    }

    /// Representative text used to probe other patterns for overlap.
    fn sample(self) -> &'static str {
        match self {
            ParamKind::String => "\"sample\"",
            ParamKind::Int => "42",
            ParamKind::Float => "4.2",
            ParamKind::Word => "sample",
        }
    }
}

/// A compiled step pattern.
#[derive(Debug, Clone)]
pub struct StepPattern {
    source: String,
    regex: Regex,
    params: Vec<ParamKind>,
    sample: String,
}

impl StepPattern {
    pub fn compile(source: &str) -> Result<Self> {
        let invalid = |reason: String| HarnessError::InvalidPattern {
            pattern: source.to_string(),
            reason,
        };

        let mut regex = String::from("^");
        let mut sample = String::new();
        let mut params = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            if literal.contains('}') {
                return Err(invalid("unbalanced `}`".to_string()));
            }
            regex.push_str(&regex::escape(literal));
            sample.push_str(literal);

            let close = tail
                .find('}')
                .ok_or_else(|| invalid("unclosed placeholder".to_string()))?;
            let name = &tail[1..close];
            let kind = ParamKind::from_name(name)
                .ok_or_else(|| invalid(format!("unknown placeholder `{{{name}}}`")))?;
            regex.push_str(kind.regex());
            sample.push_str(kind.sample());
            params.push(kind);
            rest = &tail[close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid("unbalanced `}`".to_string()));
        }
        regex.push_str(&regex::escape(rest));
        sample.push_str(rest);
        regex.push('$');

        let regex = Regex::new(&regex).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            regex,
            params,
            sample,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Whether either pattern accepts the other's representative line.
    pub fn overlaps(&self, other: &StepPattern) -> bool {
        self.source == other.source || self.is_match(&other.sample) || other.is_match(&self.sample)
    }

    /// Typed parameters for `text`, or `None` when it does not match.
    pub fn parse(&self, text: &str) -> Option<Result<Vec<Param>>> {
        let captures = self.regex.captures(text)?;
        let parsed = self
            .params
            .iter()
            .enumerate()
            .map(|(index, kind)| {
                let raw = captures.get(index + 1).map_or("", |m| m.as_str());
                self.convert(index, *kind, raw)
            })
            .collect();
        Some(parsed)
    }

    fn convert(&self, index: usize, kind: ParamKind, raw: &str) -> Result<Param> {
        let invalid = |reason: String| HarnessError::InvalidParameter {
            pattern: self.source.clone(),
            index,
            reason,
        };
        match kind {
            ParamKind::String => Ok(Param::Str(raw.to_string())),
            ParamKind::Word => Ok(Param::Word(raw.to_string())),
            ParamKind::Int => raw
                .parse()
                .map(Param::Int)
                .map_err(|e| invalid(format!("`{raw}` is not a 64-bit integer: {e}"))),
            ParamKind::Float => raw
                .parse()
                .map(Param::Float)
                .map_err(|e| invalid(format!("`{raw}` is not a number: {e}"))),
        }
    }
}
