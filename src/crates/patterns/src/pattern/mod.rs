//! Pattern model
//!
//! A pattern is a named unit of domain knowledge (templates, examples and
//! rules for a backend) parsed from one YAML document. Patterns are
//! immutable once parsed; the library shares them behind `Arc`.

mod validation;

pub use validation::ValidationReport;

use crate::error::{PatternError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

/// Maximum description length kept in a [`PatternSummary`]
pub const SUMMARY_DESCRIPTION_LEN: usize = 200;

/// A structured pattern parsed from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pattern {
    /// Unique pattern name
    pub name: String,
    /// Human-readable title
    pub title: String,
    /// Free-text description
    pub description: String,
    /// Category used for filtering and intent alignment
    pub category: String,
    /// Difficulty level (beginner, intermediate, advanced)
    pub difficulty: String,
    /// Backend the pattern targets
    pub backend_type: String,
    /// Situations where the pattern applies
    pub use_cases: Vec<String>,
    /// Names of related patterns
    pub related_patterns: Vec<String>,
    /// Parameters accepted by the templates
    pub parameters: Vec<Parameter>,
    /// Named templates
    pub templates: BTreeMap<String, Template>,
    /// Inline single template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Worked examples
    pub examples: Vec<Example>,
    /// Common errors with their causes and fixes
    pub common_errors: Vec<CommonError>,
    /// Best-practice rules
    #[serde(deserialize_with = "one_or_many")]
    pub best_practices: Vec<String>,
    /// Syntax reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax: Option<Syntax>,
    /// Backend function the pattern wraps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_function: Option<String>,
}

/// A pattern parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub required: bool,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_yaml::Value>,
}

/// A named template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    pub description: String,
    /// Template body; older files call this field `sql`
    #[serde(alias = "sql")]
    pub content: String,
    pub required_parameters: Vec<String>,
    pub output_format: String,
}

/// A worked example
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Example {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    pub expected_result: String,
    pub notes: String,
}

/// A common mistake and how to fix it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonError {
    pub error: String,
    pub cause: String,
    pub solution: String,
}

/// Syntax reference for the backend function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Syntax {
    pub format: String,
    pub example: String,
}

/// Read-only projection of a pattern used for listing and search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub backend_type: String,
    pub use_cases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_function: Option<String>,
}

impl Pattern {
    /// Parse a pattern from YAML bytes
    ///
    /// `name` only labels the error; the pattern keeps the name in its body.
    pub fn from_yaml(name: &str, data: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(data).map_err(|e| PatternError::parse(name, e))
    }

    /// Whether the pattern carries at least one content form
    /// (template, example or rule)
    pub fn has_content(&self) -> bool {
        !self.templates.is_empty()
            || self
                .template
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
            || !self.examples.is_empty()
            || !self.common_errors.is_empty()
            || !self.best_practices.is_empty()
    }

    /// Whether the pattern has a named or inline template
    pub fn has_template(&self) -> bool {
        !self.templates.is_empty() || self.template.is_some()
    }

    /// Backend function name, if set and non-empty
    pub fn backend_function(&self) -> Option<&str> {
        self.backend_function.as_deref().filter(|f| !f.is_empty())
    }

    /// Build the summary projection for this pattern
    pub fn summary(&self) -> PatternSummary {
        PatternSummary {
            name: self.name.clone(),
            title: self.title.clone(),
            description: truncate(&self.description, SUMMARY_DESCRIPTION_LEN),
            category: self.category.clone(),
            difficulty: self.difficulty.clone(),
            backend_type: self.backend_type.clone(),
            use_cases: self.use_cases.clone(),
            backend_function: self.backend_function().map(str::to_string),
        }
    }

    /// Render a template with parameter values
    ///
    /// `"default"` selects the inline template when the pattern has no named
    /// template of that name.
    pub fn render_template(
        &self,
        template_name: &str,
        params: &HashMap<String, String>,
    ) -> Result<String> {
        if let Some(template) = self.templates.get(template_name) {
            let missing = template.missing_parameters(params);
            if !missing.is_empty() {
                return Err(PatternError::validation(
                    &self.name,
                    format!(
                        "template '{}' missing required parameters: {}",
                        template_name,
                        missing.join(", ")
                    ),
                ));
            }
            return Ok(template.render(params));
        }

        match (&self.template, template_name) {
            (Some(inline), "default") => Ok(substitute(inline, params)),
            _ => Err(PatternError::NotFound(format!(
                "{}#{}",
                self.name, template_name
            ))),
        }
    }

    /// Format the pattern as a Markdown block for prompt injection
    pub fn format_for_llm(&self) -> String {
        let mut out = String::new();
        let heading = if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        };
        let _ = writeln!(out, "# {}", heading);
        let _ = writeln!(out, "Pattern: {} ({})", self.name, self.category);
        if !self.backend_type.is_empty() {
            let _ = writeln!(out, "Backend: {}", self.backend_type);
        }
        if !self.description.is_empty() {
            let _ = writeln!(out, "\n{}", self.description.trim());
        }

        if !self.use_cases.is_empty() {
            out.push_str("\n## Use cases\n");
            for use_case in &self.use_cases {
                let _ = writeln!(out, "- {}", use_case);
            }
        }

        if !self.parameters.is_empty() {
            out.push_str("\n## Parameters\n");
            for param in &self.parameters {
                let required = if param.required { "required" } else { "optional" };
                let _ = writeln!(
                    out,
                    "- `{}` ({}, {}): {}",
                    param.name, param.param_type, required, param.description
                );
            }
        }

        if let Some(syntax) = &self.syntax {
            if !syntax.format.is_empty() {
                let _ = writeln!(out, "\n## Syntax\n```\n{}\n```", syntax.format.trim());
            }
        }

        if !self.templates.is_empty() || self.template.is_some() {
            out.push_str("\n## Templates\n");
            if let Some(inline) = &self.template {
                let _ = writeln!(out, "```\n{}\n```", inline.trim());
            }
            for (name, template) in &self.templates {
                let _ = writeln!(out, "### {}", name);
                if !template.description.is_empty() {
                    let _ = writeln!(out, "{}", template.description);
                }
                let _ = writeln!(out, "```\n{}\n```", template.content.trim());
            }
        }

        if !self.examples.is_empty() {
            out.push_str("\n## Examples\n");
            for example in &self.examples {
                let label = if example.name.is_empty() {
                    &example.description
                } else {
                    &example.name
                };
                let _ = writeln!(out, "- {}", label);
                if !example.expected_result.is_empty() {
                    let _ = writeln!(out, "  Expected: {}", example.expected_result);
                }
            }
        }

        if !self.common_errors.is_empty() {
            out.push_str("\n## Common errors\n");
            for err in &self.common_errors {
                let _ = writeln!(out, "- {}: {}", err.error, err.solution);
            }
        }

        if !self.best_practices.is_empty() {
            out.push_str("\n## Best practices\n");
            for practice in &self.best_practices {
                let _ = writeln!(out, "- {}", practice);
            }
        }

        out
    }
}

impl Template {
    /// Required parameters absent from `params`
    pub fn missing_parameters<'a>(&'a self, params: &HashMap<String, String>) -> Vec<&'a str> {
        self.required_parameters
            .iter()
            .filter(|p| !params.contains_key(p.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Substitute `{{name}}` and `{{.name}}` placeholders
    pub fn render(&self, params: &HashMap<String, String>) -> String {
        substitute(&self.content, params)
    }
}

fn substitute(body: &str, params: &HashMap<String, String>) -> String {
    let mut out = body.to_string();
    for (key, value) in params {
        out = out
            .replace(&format!("{{{{.{}}}}}", key), value)
            .replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}

/// Truncate to `max` characters, ending in `...` when cut
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Accept either a single string or a list of strings
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQL_JOINS: &str = r#"
name: sql_joins
title: SQL Join Optimization
description: Choose join strategies for large tables
category: analytics
difficulty: intermediate
backend_type: sql
use_cases:
  - optimize joins
parameters:
  - name: left_table
    type: string
    required: true
    description: Left side of the join
templates:
  basic:
    description: Inner join
    sql: "SELECT * FROM {{.left_table}} l JOIN {{right_table}} r ON l.id = r.id"
    required_parameters: [left_table]
best_practices: Filter before joining
"#;

    #[test]
    fn test_parse_pattern() {
        let pattern = Pattern::from_yaml("sql_joins", SQL_JOINS.as_bytes()).unwrap();
        assert_eq!(pattern.name, "sql_joins");
        assert_eq!(pattern.category, "analytics");
        assert_eq!(pattern.use_cases, vec!["optimize joins"]);
        assert_eq!(pattern.parameters[0].param_type, "string");
        assert!(pattern.templates["basic"].content.starts_with("SELECT"));
        assert_eq!(pattern.best_practices, vec!["Filter before joining"]);
        assert!(pattern.has_content());
    }

    #[test]
    fn test_parse_error_is_not_panic() {
        let err = Pattern::from_yaml("broken", b"name: [unclosed").unwrap_err();
        assert!(matches!(err, PatternError::Parse { .. }));
    }

    #[test]
    fn test_inline_template_counts_as_content() {
        let pattern =
            Pattern::from_yaml("p", b"name: p\ncategory: analytics\ntemplate: SELECT 1\n").unwrap();
        assert!(pattern.has_content());
        assert!(pattern.has_template());
    }

    #[test]
    fn test_summary_truncates_description() {
        let pattern = Pattern {
            name: "long".into(),
            description: "é".repeat(300),
            ..Default::default()
        };
        let summary = pattern.summary();
        assert_eq!(summary.description.chars().count(), SUMMARY_DESCRIPTION_LEN);
        assert!(summary.description.ends_with("..."));

        let short = Pattern {
            description: "short".into(),
            ..Default::default()
        };
        assert_eq!(short.summary().description, "short");
    }

    #[test]
    fn test_render_template() {
        let pattern = Pattern::from_yaml("sql_joins", SQL_JOINS.as_bytes()).unwrap();
        let mut params = HashMap::new();
        params.insert("left_table".to_string(), "orders".to_string());
        params.insert("right_table".to_string(), "customers".to_string());

        let sql = pattern.render_template("basic", &params).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM orders l JOIN customers r ON l.id = r.id"
        );

        let err = pattern
            .render_template("basic", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, PatternError::Validation { .. }));

        assert!(pattern.render_template("missing", &params).is_err());
    }

    #[test]
    fn test_format_for_llm() {
        let pattern = Pattern::from_yaml("sql_joins", SQL_JOINS.as_bytes()).unwrap();
        let text = pattern.format_for_llm();
        assert!(text.starts_with("# SQL Join Optimization"));
        assert!(text.contains("## Use cases\n- optimize joins"));
        assert!(text.contains("### basic"));
        assert!(text.contains("`left_table` (string, required)"));
        assert!(text.contains("## Best practices"));
    }
}
