//! Gherkin feature files, parsed with the `gherkin` crate and flattened
//! into runnable scenarios.
//!
//! Backgrounds (feature and rule level) are prepended, `Rule:` blocks are
//! flattened, and outline `Examples` are expanded row by row.

use gherkin::GherkinEnv;
use probe_core::{HarnessError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use step_registry::{StepLine, Table};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub path: PathBuf,
    pub tags: Vec<String>,
    pub scenarios: Vec<Scenario>,
}

/// A runnable scenario. Background steps are already prepended, outline
/// examples already expanded, and feature and rule tags already inherited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    /// Tag names without the leading `@`.
    pub tags: Vec<String>,
    pub steps: Vec<StepLine>,
    pub location: String,
}

impl Scenario {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl Feature {
    pub fn steps(&self) -> impl Iterator<Item = &StepLine> {
        self.scenarios.iter().flat_map(|scenario| scenario.steps.iter())
    }
}

/// Load every feature named by `paths`; directories are searched
/// recursively for `*.feature` files in lexical order.
pub fn load_features<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Feature>> {
    let mut files = Vec::new();
    for path in paths {
        collect_feature_files(path.as_ref(), &mut files)?;
    }
    files.iter().map(|file| load_feature(file)).collect()
}

pub fn load_feature(path: &Path) -> Result<Feature> {
    let source = fs::read_to_string(path).map_err(|source| HarnessError::FeatureIo {
        path: path.to_path_buf(),
        source,
    })?;
    let feature = parse_feature(path, &source)?;
    debug!(path = %path.display(), scenarios = feature.scenarios.len(), "Feature loaded");
    Ok(feature)
}

fn collect_feature_files(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let io_error = |source| HarnessError::FeatureIo {
        path: path.to_path_buf(),
        source,
    };
    if !path.is_dir() {
        files.push(path.to_path_buf());
        return Ok(());
    }

    let mut entries = fs::read_dir(path)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_error)?;
    entries.sort();
    for entry in entries {
        if entry.is_dir() {
            collect_feature_files(&entry, files)?;
        } else if entry.extension().is_some_and(|ext| ext == "feature") {
            files.push(entry);
        }
    }
    Ok(())
}

/// Parse feature `source`; `path` only names locations and errors.
pub fn parse_feature(path: &Path, source: &str) -> Result<Feature> {
    let mut source = source.to_string();
    if !source.ends_with('\n') {
        source.push('\n');
    }
    let parsed = gherkin::Feature::parse(&source, GherkinEnv::default())
        .map_err(|e| syntax_error(path, e.to_string()))?;

    let flattener = Flattener { path };
    let background = flattener.background(parsed.background.as_ref())?;
    let mut scenarios = Vec::new();

    for scenario in &parsed.scenarios {
        flattener.scenario(scenario, &background, &parsed.tags, &mut scenarios)?;
    }
    for rule in &parsed.rules {
        let mut steps = background.clone();
        steps.extend(flattener.background(rule.background.as_ref())?);
        let tags = merge_tags(&parsed.tags, &rule.tags);
        for scenario in &rule.scenarios {
            flattener.scenario(scenario, &steps, &tags, &mut scenarios)?;
        }
    }

    Ok(Feature {
        name: parsed.name,
        path: path.to_path_buf(),
        tags: parsed.tags,
        scenarios,
    })
}

fn syntax_error(path: &Path, reason: impl Into<String>) -> HarnessError {
    HarnessError::FeatureSyntax {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn merge_tags(inherited: &[String], own: &[String]) -> Vec<String> {
    let mut tags = inherited.to_vec();
    for tag in own {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}

struct Flattener<'p> {
    path: &'p Path,
}

impl Flattener<'_> {
    fn location(&self, line: usize) -> String {
        format!("{}:{}", self.path.display(), line)
    }

    fn background(&self, background: Option<&gherkin::Background>) -> Result<Vec<StepLine>> {
        background
            .map(|b| b.steps.iter().map(|step| self.step(step)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn step(&self, step: &gherkin::Step) -> Result<StepLine> {
        let location = self.location(step.position.line);
        let table = step.table.as_ref().map(|t| self.table(t)).transpose()?;
        Ok(StepLine {
            keyword: format!("{} ", step.keyword.trim()),
            text: step.value.trim().to_string(),
            table,
            docstring: step.docstring.as_deref().map(dedent),
            location,
        })
    }

    fn table(&self, table: &gherkin::Table) -> Result<Table> {
        let width = table.rows.first().map_or(0, Vec::len);
        for (offset, row) in table.rows.iter().enumerate() {
            if row.len() != width {
                return Err(syntax_error(
                    self.path,
                    format!(
                        "line {}: table row has {} cells, expected {width}",
                        table.position.line + offset,
                        row.len()
                    ),
                ));
            }
        }
        Ok(Table::new(table.rows.clone()))
    }

    fn scenario(
        &self,
        scenario: &gherkin::Scenario,
        background: &[StepLine],
        inherited_tags: &[String],
        out: &mut Vec<Scenario>,
    ) -> Result<()> {
        let tags = merge_tags(inherited_tags, &scenario.tags);
        let mut own_steps = Vec::with_capacity(scenario.steps.len());
        for step in &scenario.steps {
            own_steps.push(self.step(step)?);
        }

        let is_outline = scenario.keyword.contains("Outline") || scenario.keyword.contains("Template");
        if scenario.examples.is_empty() && !is_outline {
            let mut steps = background.to_vec();
            steps.extend(own_steps);
            out.push(Scenario {
                name: scenario.name.clone(),
                tags,
                steps,
                location: self.location(scenario.position.line),
            });
            return Ok(());
        }

        let mut expanded = 0;
        for examples in &scenario.examples {
            let Some(raw) = examples.table.as_ref() else {
                continue;
            };
            let first_row_line = raw.position.line + 1;
            let table = self.table(raw)?;
            let Some((headings, rows)) = table.raw_rows().split_first() else {
                continue;
            };
            let example_tags = merge_tags(&tags, &examples.tags);

            for (offset, cells) in rows.iter().enumerate() {
                let values: Vec<(&str, &str)> = headings
                    .iter()
                    .map(String::as_str)
                    .zip(cells.iter().map(String::as_str))
                    .collect();
                let fill = |text: &str| fill_placeholders(text, &values);

                let mut steps = background.to_vec();
                steps.extend(own_steps.iter().map(|step| StepLine {
                    keyword: step.keyword.clone(),
                    text: fill(&step.text),
                    table: step.table.as_ref().map(|table| table.map_cells(fill)),
                    docstring: step.docstring.as_deref().map(fill),
                    location: step.location.clone(),
                }));
                out.push(Scenario {
                    name: format!("{} [{}]", fill(&scenario.name), cells.join(", ")),
                    tags: example_tags.clone(),
                    steps,
                    location: self.location(first_row_line + offset),
                });
                expanded += 1;
            }
        }

        if expanded == 0 {
            return Err(syntax_error(
                self.path,
                format!("line {}: Scenario Outline has no example rows", scenario.position.line),
            ));
        }
        Ok(())
    }
}

fn fill_placeholders(text: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(text.to_string(), |text, (name, value)| {
        text.replace(&format!("<{name}>"), value)
    })
}

/// Drop blank edge lines and the indentation shared by every non-blank
/// line, counted in characters.
fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let Some(first) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return String::new();
    };
    let last = lines.iter().rposition(|line| !line.trim().is_empty()).unwrap_or(first);
    let body = &lines[first..=last];

    let indent = body
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);
    body.iter()
        .map(|line| line.chars().skip(indent).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Feature> {
        parse_feature(Path::new("forms.feature"), source)
    }

    const VERSIONS: &str = r#"
@forms
Feature: Form versions
  Versions are published and deprecated.

  Background:
    Given form "leave-request" exists

  # Creation
  @smoke
  Scenario: Create a version
    When I create a new version "1.0" for form "leave-request"
    Then the response status should be 201

  Scenario: Latest version wins by publish date
    Given multiple versions exist for form "leave-request"
      | version | publishedDate |
      | 1.0     | 1700000000000 |
      | 2.0     | 1710000000000 |
    When I request the latest version for "leave-request"
    Then the response should contain version "2.0"
"#;

    #[test]
    fn test_background_is_prepended_and_tags_are_inherited() {
        let feature = parse(VERSIONS).unwrap();
        assert_eq!(feature.name, "Form versions");
        assert_eq!(feature.scenarios.len(), 2);

        let create = &feature.scenarios[0];
        assert_eq!(create.tags, vec!["forms", "smoke"]);
        assert_eq!(create.steps[0].text, r#"form "leave-request" exists"#);
        assert_eq!(create.steps[1].keyword, "When ");
        assert_eq!(create.steps[1].location, "forms.feature:12");
        assert_eq!(create.location, "forms.feature:11");
        assert!(feature.scenarios[1].has_tag("forms"));
        assert!(!feature.scenarios[1].has_tag("smoke"));
    }

    #[test]
    fn test_tables_attach_to_the_preceding_step() {
        let feature = parse(VERSIONS).unwrap();
        let table = feature.scenarios[1].steps[1].table.as_ref().unwrap();
        assert_eq!(table.records()[1]["version"], "2.0");
        assert!(feature.scenarios[1].steps[2].table.is_none());
    }

    #[test]
    fn test_outline_expands_each_example_row() {
        let feature = parse(
            r#"
Feature: Outline
  Scenario Outline: Status for <version>
    When I request version "<version>" for form "f"
    Then the response status should be <status>

    @known
    Examples:
      | version | status |
      | 1.0     | 200    |
      | 9.9     | 404    |
"#,
        )
        .unwrap();

        assert_eq!(feature.scenarios.len(), 2);
        let missing = &feature.scenarios[1];
        assert_eq!(missing.name, "Status for 9.9 [9.9, 404]");
        assert_eq!(missing.steps[0].text, r#"I request version "9.9" for form "f""#);
        assert_eq!(missing.steps[1].text, "the response status should be 404");
        assert_eq!(missing.tags, vec!["known"]);
        assert_eq!(missing.location, "forms.feature:11");
    }

    #[test]
    fn test_rules_carry_their_own_background_and_tags() {
        let feature = parse(
            r#"
Feature: Rules
  Background:
    Given the form API is available

  @versions
  Rule: Versions can be deprecated
    Background:
      Given form "onboarding" exists

    Scenario: Deprecate
      When I deprecate version "1.0"
"#,
        )
        .unwrap();

        assert_eq!(feature.scenarios.len(), 1);
        let scenario = &feature.scenarios[0];
        let texts: Vec<&str> = scenario.steps.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["the form API is available", r#"form "onboarding" exists"#, r#"I deprecate version "1.0""#]
        );
        assert!(scenario.has_tag("versions"));
    }

    #[test]
    fn test_doc_strings_keep_relative_indentation() {
        let feature = parse(
            "Feature: Docs\n  Scenario: Body\n    Given a request body\n      \"\"\"\n      {\n        \"name\": \"x\"\n      }\n      \"\"\"\n",
        )
        .unwrap();
        assert_eq!(
            feature.scenarios[0].steps[0].docstring.as_deref(),
            Some("{\n  \"name\": \"x\"\n}")
        );
    }

    #[test]
    fn test_multibyte_indentation_is_stripped_by_character() {
        assert_eq!(dedent("    \u{a0}\u{a0}body\n     next"), "\u{a0}body\nnext");
        assert_eq!(dedent(" \u{a0}\u{a0}body"), "body");
    }

    #[test]
    fn test_doc_string_with_non_breaking_space_parses() {
        let source = "Feature: Docs\n  Scenario: Body\n    Given a request body\n    \"\"\"\n \u{a0}\u{a0}body\n    \"\"\"\n";
        let feature = parse(source).unwrap();
        let docstring = feature.scenarios[0].steps[0].docstring.as_deref().unwrap();
        assert!(docstring.ends_with("body"));
    }

    #[test]
    fn test_syntax_errors_name_the_file() {
        for source in [
            "Scenario: no feature\n",
            "Feature: f\n  Scenario: s\n    Given x\n      | a | b |\n      | 1 |\n",
            "Feature: f\n  Scenario Outline: s\n    Given <x>\n",
        ] {
            match parse(source) {
                Err(HarnessError::FeatureSyntax { path, .. }) => assert_eq!(path, Path::new("forms.feature")),
                other => panic!("expected syntax error for {source:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_file_is_feature_io_error() {
        let result = load_features(&["/nonexistent/flowprobe.feature"]);
        assert!(matches!(result, Err(HarnessError::FeatureIo { .. })));
    }
}
