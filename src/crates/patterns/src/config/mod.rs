//! Runtime configuration
//!
//! Settings come from a YAML file ([`PatternsConfig::from_file`]) or from
//! `PATTERNS_*` environment variables ([`PatternsConfig::from_env`]). String
//! values in the file may reference environment variables as `${VAR}` or
//! `${VAR:default}`.

pub mod env;
mod loader;

pub use loader::{expand_env_in_string, load_yaml_config, parse_yaml_config};

use crate::error::{PatternError, Result};
use crate::library::{HotReloadConfig, Library};
use crate::router::LlmClassifierConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    pub library: LibraryConfig,
    pub hot_reload: HotReloadSettings,
    pub classifier: ClassifierSettings,
}

/// Where patterns come from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Filesystem root; `None` means bundled patterns only
    pub patterns_dir: Option<PathBuf>,
    /// Subdirectories searched after the built-in list
    pub extra_search_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotReloadSettings {
    pub enabled: bool,
    pub debounce_ms: u64,
    pub stop_timeout_ms: u64,
}

impl Default for HotReloadSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: 500,
            stop_timeout_ms: 5000,
        }
    }
}

/// Which intent classifier the orchestrator uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    #[default]
    Keyword,
    Llm,
}

impl fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierMode::Keyword => f.write_str("keyword"),
            ClassifierMode::Llm => f.write_str("llm"),
        }
    }
}

impl FromStr for ClassifierMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyword" => Ok(ClassifierMode::Keyword),
            "llm" => Ok(ClassifierMode::Llm),
            other => Err(format!("unknown classifier '{}', expected keyword or llm", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub mode: ClassifierMode,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    /// Per-call LLM timeout; unset means no limit
    pub call_timeout_ms: Option<u64>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::Keyword,
            cache_enabled: true,
            cache_ttl_secs: 15 * 60,
            cache_max_entries: 5000,
            call_timeout_ms: None,
        }
    }
}

impl PatternsConfig {
    /// Load from a YAML file, expanding environment references
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_yaml_config(path, &env::process_env)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `PATTERNS_*` environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env::process_env)
    }

    /// Like [`from_env`](Self::from_env) with a custom variable lookup
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields with any `PATTERNS_*` variables that are set
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup(env::PATTERNS_DIR) {
            self.library.patterns_dir = Some(PathBuf::from(dir));
        }
        if let Some(enabled) = env::parse_flag(lookup, env::PATTERNS_HOT_RELOAD)? {
            self.hot_reload.enabled = enabled;
        }
        if let Some(ms) = env::parse_var(lookup, env::PATTERNS_DEBOUNCE_MS)? {
            self.hot_reload.debounce_ms = ms;
        }
        if let Some(mode) = env::parse_var(lookup, env::PATTERNS_CLASSIFIER)? {
            self.classifier.mode = mode;
        }
        if let Some(secs) = env::parse_var(lookup, env::PATTERNS_LLM_CACHE_TTL_SECS)? {
            self.classifier.cache_ttl_secs = secs;
        }
        if let Some(max) = env::parse_var(lookup, env::PATTERNS_LLM_CACHE_MAX_ENTRIES)? {
            self.classifier.cache_max_entries = max;
        }
        Ok(())
    }

    /// Reject settings the components cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.hot_reload.debounce_ms == 0 {
            return Err(PatternError::Config(
                "hot_reload.debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.hot_reload.stop_timeout_ms == 0 {
            return Err(PatternError::Config(
                "hot_reload.stop_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.classifier.cache_enabled {
            if self.classifier.cache_max_entries == 0 {
                return Err(PatternError::Config(
                    "classifier.cache_max_entries must be greater than zero".to_string(),
                ));
            }
            if self.classifier.cache_ttl_secs == 0 {
                return Err(PatternError::Config(
                    "classifier.cache_ttl_secs must be greater than zero".to_string(),
                ));
            }
        }
        if self.hot_reload.enabled && self.library.patterns_dir.is_none() {
            return Err(PatternError::Config(
                "hot_reload.enabled requires library.patterns_dir".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a library over the configured directory and search paths
    pub fn build_library(&self) -> Library {
        let library = match &self.library.patterns_dir {
            Some(dir) => Library::with_directory(dir),
            None => Library::new(),
        };
        for path in &self.library.extra_search_paths {
            library.add_search_path(path.as_str());
        }
        library
    }

    pub fn to_reload_config(&self) -> HotReloadConfig {
        HotReloadConfig {
            enabled: self.hot_reload.enabled,
            debounce: Duration::from_millis(self.hot_reload.debounce_ms),
            stop_timeout: Duration::from_millis(self.hot_reload.stop_timeout_ms),
            on_update: None,
        }
    }

    pub fn to_llm_config(&self) -> LlmClassifierConfig {
        LlmClassifierConfig {
            enable_cache: self.classifier.cache_enabled,
            cache_ttl: Duration::from_secs(self.classifier.cache_ttl_secs),
            cache_max_entries: self.classifier.cache_max_entries,
            call_timeout: self.classifier.call_timeout_ms.map(Duration::from_millis),
        }
    }
}
