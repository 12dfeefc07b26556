use super::Pattern;
use crate::error::{PatternError, Result};

const DIFFICULTIES: &[&str] = &["beginner", "intermediate", "advanced"];
const PARAMETER_TYPES: &[&str] = &["string", "integer", "number", "boolean", "object", "array"];

/// Non-fatal findings from [`Pattern::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl Pattern {
    /// Check that the pattern is acceptable for serving
    ///
    /// Name, category and at least one content form are required. Everything
    /// else is reported as a warning.
    pub fn validate(&self) -> Result<ValidationReport> {
        let label = if self.name.is_empty() {
            "<unnamed>"
        } else {
            self.name.as_str()
        };

        if self.name.trim().is_empty() {
            return Err(PatternError::validation(label, "name is required"));
        }
        if self.category.trim().is_empty() {
            return Err(PatternError::validation(label, "category is required"));
        }
        if !self.has_content() {
            return Err(PatternError::validation(
                label,
                "pattern needs at least one template, example or rule",
            ));
        }

        let mut report = ValidationReport::default();

        if self.backend_function().is_some() && !self.has_template() && self.examples.is_empty() {
            report.warn("backend_function is set but pattern has no templates or examples");
        }

        if !self.difficulty.is_empty() && !DIFFICULTIES.contains(&self.difficulty.as_str()) {
            report.warn(format!(
                "unknown difficulty '{}', expected one of {}",
                self.difficulty,
                DIFFICULTIES.join(", ")
            ));
        }

        for param in &self.parameters {
            if !param.param_type.is_empty() && !is_known_parameter_type(&param.param_type) {
                report.warn(format!(
                    "parameter '{}' has unrecognized type '{}'",
                    param.name, param.param_type
                ));
            }
        }

        for (name, template) in &self.templates {
            if template.content.trim().is_empty() {
                report.warn(format!("template '{}' is empty", name));
            }
        }

        if !is_snake_case(&self.name) {
            report.warn(format!("name '{}' is not snake_case", self.name));
        }

        Ok(report)
    }
}

fn is_known_parameter_type(param_type: &str) -> bool {
    PARAMETER_TYPES.contains(&param_type)
        || param_type == "enum"
        || ["array[", "map[", "enum["]
            .iter()
            .any(|prefix| param_type.starts_with(prefix))
}

// Dots are allowed so variant names like `sql_joins.v2` pass.
fn is_snake_case(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Example, Parameter};

    fn valid() -> Pattern {
        Pattern {
            name: "sql_joins".into(),
            category: "analytics".into(),
            template: Some("SELECT 1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_pattern() {
        let report = valid().validate().unwrap();
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_missing_required_fields() {
        let mut p = valid();
        p.name.clear();
        assert!(matches!(p.validate(), Err(PatternError::Validation { .. })));

        let mut p = valid();
        p.category = "  ".into();
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("category is required"));

        let mut p = valid();
        p.template = None;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_backend_function_without_template_warns() {
        let p = Pattern {
            name: "npath".into(),
            category: "analytics".into(),
            backend_function: Some("NPath".into()),
            best_practices: vec!["Partition first".into()],
            ..Default::default()
        };
        let report = p.validate().unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("backend_function"));

        let mut with_example = p.clone();
        with_example.examples.push(Example::default());
        assert!(!with_example.validate().unwrap().has_warnings());
    }

    #[test]
    fn test_quality_warnings() {
        let mut p = valid();
        p.name = "SqlJoins".into();
        p.difficulty = "expert".into();
        p.parameters.push(Parameter {
            name: "cols".into(),
            param_type: "list".into(),
            ..Default::default()
        });
        p.parameters.push(Parameter {
            name: "mode".into(),
            param_type: "enum[a,b]".into(),
            ..Default::default()
        });

        let report = p.validate().unwrap();
        assert_eq!(report.warnings.len(), 3);
    }
}
