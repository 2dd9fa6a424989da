//! Step lines and the arguments handed to step handlers

use probe_core::{HarnessError, Result};
use std::collections::BTreeMap;

/// One parsed placeholder value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(String),
    Word(String),
    Int(i64),
    Float(f64),
}

/// A data table attached to a step. The first row holds the headings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn headings(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn raw_rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Cell count of the heading row.
    pub fn width(&self) -> Option<usize> {
        self.rows.first().map(Vec::len)
    }

    /// Data rows as heading -> cell mappings, in table order.
    pub fn records(&self) -> Vec<BTreeMap<String, String>> {
        let headings = self.headings();
        self.rows
            .iter()
            .skip(1)
            .map(|row| {
                headings
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub fn map_cells(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(|cell| f(cell)).collect())
                .collect(),
        }
    }
}

/// One step of a scenario, with its keyword already stripped from `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLine {
    pub keyword: String,
    pub text: String,
    pub table: Option<Table>,
    pub docstring: Option<String>,
    /// `path:line` of the step in its feature file.
    pub location: String,
}

impl StepLine {
    pub fn new(keyword: impl Into<String>, text: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            text: text.into(),
            table: None,
            docstring: None,
            location: location.into(),
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }
}

/// Arguments a handler receives for one step invocation.
#[derive(Debug, Clone)]
pub struct StepArgs {
    pattern: String,
    params: Vec<Param>,
    table: Option<Table>,
    docstring: Option<String>,
}

impl StepArgs {
    pub fn new(pattern: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            pattern: pattern.into(),
            params,
            table: None,
            docstring: None,
        }
    }

    pub fn with_table(mut self, table: Option<Table>) -> Self {
        self.table = table;
        self
    }

    pub fn with_docstring(mut self, docstring: Option<String>) -> Self {
        self.docstring = docstring;
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Text of a `{string}` or `{word}` parameter.
    pub fn str(&self, index: usize) -> Result<&str> {
        match self.params.get(index) {
            Some(Param::Str(value)) | Some(Param::Word(value)) => Ok(value.as_str()),
            other => Err(self.invalid(index, other, "text")),
        }
    }

    pub fn string(&self, index: usize) -> Result<String> {
        self.str(index).map(str::to_owned)
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        match self.params.get(index) {
            Some(Param::Int(value)) => Ok(*value),
            other => Err(self.invalid(index, other, "an integer")),
        }
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        match self.params.get(index) {
            Some(Param::Float(value)) => Ok(*value),
            Some(Param::Int(value)) => Ok(*value as f64),
            other => Err(self.invalid(index, other, "a number")),
        }
    }

    pub fn table(&self) -> Result<&Table> {
        self.table.as_ref().ok_or_else(|| HarnessError::MissingTable {
            pattern: self.pattern.clone(),
        })
    }

    pub fn docstring(&self) -> Option<&str> {
        self.docstring.as_deref()
    }

    fn invalid(&self, index: usize, found: Option<&Param>, wanted: &str) -> HarnessError {
        HarnessError::InvalidParameter {
            pattern: self.pattern.clone(),
            index,
            reason: match found {
                Some(param) => format!("expected {wanted}, found {param:?}"),
                None => format!("expected {wanted}, but the pattern has no such parameter"),
            },
        }
    }
}
