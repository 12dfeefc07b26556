//! Error types for pattern operations

use thiserror::Error;

/// Errors that can occur while loading, validating or routing patterns
#[derive(Debug, Error)]
pub enum PatternError {
    /// No backing store holds a pattern with this name
    #[error("Pattern not found: {0}")]
    NotFound(String),

    /// Pattern source could not be parsed as YAML
    #[error("Failed to parse pattern '{name}': {message}")]
    Parse { name: String, message: String },

    /// Pattern parsed but is not acceptable
    #[error("Invalid pattern '{name}': {reason}")]
    Validation { name: String, reason: String },

    /// Resolved path left the configured patterns root
    #[error("Pattern path escapes patterns root: {0}")]
    PathEscape(String),

    /// No execution plan exists for an intent
    #[error("Cannot plan execution for intent: {0}")]
    Planning(String),

    /// Variant selection failed
    #[error("Variant selection failed: {0}")]
    Variant(String),

    /// Watcher setup or lifecycle failure
    #[error("Hot reload error: {0}")]
    HotReload(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PatternError {
    /// Build a parse error for the named pattern
    pub fn parse(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Build a validation error for the named pattern
    pub fn validation(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the pattern simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Short machine-readable label used in span attributes and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Parse { .. } => "parse_error",
            Self::Validation { .. } => "validation_error",
            Self::PathEscape(_) => "path_escape",
            Self::Planning(_) => "planning_error",
            Self::Variant(_) => "variant_error",
            Self::HotReload(_) => "hot_reload_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }
}

/// Result type for pattern operations
pub type Result<T> = std::result::Result<T, PatternError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(PatternError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(PatternError::parse("x", "bad").kind(), "parse_error");
        assert!(PatternError::NotFound("x".into()).is_not_found());
        assert!(!PatternError::PathEscape("../x".into()).is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = PatternError::validation("sql_joins", "category is required");
        assert_eq!(
            err.to_string(),
            "Invalid pattern 'sql_joins': category is required"
        );
    }
}
