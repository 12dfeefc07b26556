//! Typed environment lookups

use crate::error::{PatternError, Result};
use std::str::FromStr;

pub const PATTERNS_DIR: &str = "PATTERNS_DIR";
pub const PATTERNS_HOT_RELOAD: &str = "PATTERNS_HOT_RELOAD";
pub const PATTERNS_DEBOUNCE_MS: &str = "PATTERNS_DEBOUNCE_MS";
pub const PATTERNS_CLASSIFIER: &str = "PATTERNS_CLASSIFIER";
pub const PATTERNS_LLM_CACHE_TTL_SECS: &str = "PATTERNS_LLM_CACHE_TTL_SECS";
pub const PATTERNS_LLM_CACHE_MAX_ENTRIES: &str = "PATTERNS_LLM_CACHE_MAX_ENTRIES";

/// Process environment lookup
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable if it is set
pub fn parse_var<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| PatternError::Config(format!("{}={:?}: {}", key, raw, e)))
        })
        .transpose()
}

/// Parse a boolean flag; accepts `1/0`, `true/false`, `yes/no`, `on/off`
pub fn parse_flag(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    lookup(key)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(PatternError::Config(format!(
                "{}={:?}: expected a boolean",
                key, raw
            ))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        let lookup = |key: &str| (key == "N").then(|| " 12 ".to_string());
        assert_eq!(parse_var::<u64>(&lookup, "N").unwrap(), Some(12));
        assert_eq!(parse_var::<u64>(&lookup, "OTHER").unwrap(), None);

        let bad = |_: &str| Some("twelve".to_string());
        assert!(matches!(
            parse_var::<u64>(&bad, "N"),
            Err(PatternError::Config(_))
        ));
    }

    #[test]
    fn test_parse_flag() {
        for (raw, expected) in [("1", true), ("Yes", true), ("off", false), ("FALSE", false)] {
            let lookup = move |_: &str| Some(raw.to_string());
            assert_eq!(parse_flag(&lookup, "F").unwrap(), Some(expected));
        }
        let bad = |_: &str| Some("maybe".to_string());
        assert!(parse_flag(&bad, "F").is_err());
    }
}
