//! Intent routing
//!
//! Classifies free-text requests into an [`IntentCategory`], derives an
//! [`ExecutionPlan`] for the intent, and recommends a pattern from the
//! library. Classification and planning are pluggable through the
//! [`IntentClassifier`] and [`ExecutionPlanner`] traits.

mod cache;
mod keyword;
mod llm_classifier;
mod orchestrator;
mod planner;

pub use cache::ClassificationCache;
pub use keyword::KeywordClassifier;
pub use llm_classifier::{
    build_classification_prompt, parse_classification_response, LlmClassifierConfig,
    LlmIntentClassifier,
};
pub use orchestrator::{Orchestrator, PatternRecommendation, RoutingDecision};
pub use planner::StaticPlanner;

use crate::error::{PatternError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Request-scoped key/value data passed to classifiers and planners
pub type ContextData = HashMap<String, serde_json::Value>;

/// Purpose of a user request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    SchemaDiscovery,
    DataQuality,
    DataTransform,
    Analytics,
    RelationshipQuery,
    QueryGeneration,
    DocumentSearch,
    ApiCall,
    Unknown,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 9] = [
        IntentCategory::SchemaDiscovery,
        IntentCategory::DataQuality,
        IntentCategory::DataTransform,
        IntentCategory::Analytics,
        IntentCategory::RelationshipQuery,
        IntentCategory::QueryGeneration,
        IntentCategory::DocumentSearch,
        IntentCategory::ApiCall,
        IntentCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::SchemaDiscovery => "schema_discovery",
            IntentCategory::DataQuality => "data_quality",
            IntentCategory::DataTransform => "data_transform",
            IntentCategory::Analytics => "analytics",
            IntentCategory::RelationshipQuery => "relationship_query",
            IntentCategory::QueryGeneration => "query_generation",
            IntentCategory::DocumentSearch => "document_search",
            IntentCategory::ApiCall => "api_call",
            IntentCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentCategory {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        IntentCategory::ALL
            .into_iter()
            .find(|intent| intent.as_str() == wanted)
            .ok_or_else(|| PatternError::Planning(format!("unrecognized intent '{}'", s)))
    }
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: IntentCategory,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

impl Classification {
    pub fn new(intent: IntentCategory, confidence: f64) -> Self {
        Self { intent, confidence }
    }

    pub fn unknown() -> Self {
        Self::new(IntentCategory::Unknown, 0.0)
    }
}

/// One tool invocation in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub tool_name: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_hint: Option<String>,
}

impl PlannedStep {
    pub fn new(tool_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            params: HashMap::new(),
            description: description.into(),
            pattern_hint: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_pattern_hint(mut self, pattern: impl Into<String>) -> Self {
        self.pattern_hint = Some(pattern.into());
        self
    }
}

/// Ordered tool invocations for an intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub intent: IntentCategory,
    pub description: String,
    pub reasoning: String,
    pub steps: Vec<PlannedStep>,
}

/// Maps a message to an intent
///
/// Classification always yields an answer; implementations recover from
/// their own failures.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, message: &str, context: &ContextData) -> Classification;
}

#[async_trait]
impl<F> IntentClassifier for F
where
    F: Fn(&str, &ContextData) -> Classification + Send + Sync,
{
    async fn classify(&self, message: &str, context: &ContextData) -> Classification {
        self(message, context)
    }
}

/// Maps an intent to an execution plan
pub trait ExecutionPlanner: Send + Sync {
    fn plan(&self, intent: IntentCategory, message: &str, context: &ContextData)
        -> Result<ExecutionPlan>;
}

impl<F> ExecutionPlanner for F
where
    F: Fn(IntentCategory, &str, &ContextData) -> Result<ExecutionPlan> + Send + Sync,
{
    fn plan(
        &self,
        intent: IntentCategory,
        message: &str,
        context: &ContextData,
    ) -> Result<ExecutionPlan> {
        self(intent, message, context)
    }
}
