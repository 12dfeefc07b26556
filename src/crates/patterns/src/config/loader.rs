//! YAML config loading with `${VAR}` / `${VAR:default}` expansion

use crate::error::{PatternError, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::Path;

const ENV_REFERENCE: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::([^}]*))?\}";

/// Read a YAML file, expand variables and deserialize it
pub fn load_yaml_config<T, P>(path: P, lookup: &dyn Fn(&str) -> Option<String>) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        PatternError::Config(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_yaml_config(&content, lookup).map_err(|e| match e {
        PatternError::Config(message) => {
            PatternError::Config(format!("{}: {}", path.display(), message))
        }
        other => other,
    })
}

/// Parse YAML text, expand variables and deserialize it
pub fn parse_yaml_config<T: DeserializeOwned>(
    content: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<T> {
    let mut value: Value = if content.trim().is_empty() {
        Value::Mapping(Default::default())
    } else {
        serde_yaml::from_str(content)
            .map_err(|e| PatternError::Config(format!("invalid YAML: {}", e)))?
    };
    expand_variables(&mut value, lookup);
    serde_yaml::from_value(value)
        .map_err(|e| PatternError::Config(format!("invalid configuration: {}", e)))
}

/// Expand variables in every string scalar
///
/// An expanded scalar is re-read as YAML so `"${DEBOUNCE:500}"` becomes a
/// number and `"${ENABLED:true}"` a bool.
fn expand_variables(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand_env_in_string(s, lookup) {
                *value = match serde_yaml::from_str::<Value>(&expanded) {
                    Ok(scalar @ (Value::Bool(_) | Value::Number(_))) => scalar,
                    _ => Value::String(expanded),
                };
            }
        }
        Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_variables(v, lookup);
            }
        }
        Value::Sequence(seq) => {
            for item in seq.iter_mut() {
                expand_variables(item, lookup);
            }
        }
        _ => {}
    }
}

/// Substitute `${VAR}` and `${VAR:default}` references
///
/// Unset variables without a default expand to an empty string. Returns
/// `None` when the string holds no reference.
pub fn expand_env_in_string(s: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    if !s.contains("${") {
        return None;
    }
    let re = Regex::new(ENV_REFERENCE).ok()?;
    let expanded = re.replace_all(s, |caps: &regex::Captures<'_>| {
        lookup(&caps[1])
            .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
            .unwrap_or_default()
    });
    Some(expanded.into_owned())
}
