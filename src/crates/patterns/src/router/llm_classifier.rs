//! LLM-backed intent classifier
//!
//! Asks an injected [`LlmProvider`] to classify a message, with the keyword
//! classifier as fallback on any failure. Successful answers are cached per
//! exact message.

use super::cache::ClassificationCache;
use super::keyword::KeywordClassifier;
use super::{Classification, ContextData, IntentCategory, IntentClassifier};
use crate::llm::{ChatMessage, LlmError, LlmProvider};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prompt template for intent classification
const CLASSIFICATION_PROMPT: &str = r#"Classify the user's intent for a {backend_type} backend system.

Available intent categories:
1. schema_discovery - User wants to explore database structure, tables, columns, metadata
   Examples: "show me all tables", "what columns are in orders table", "describe the schema"

2. data_quality - User wants to validate data, find duplicates, check completeness, integrity
   Examples: "find duplicate records", "check for null values", "validate data quality"

3. data_transform - User wants to move, copy, transform, or migrate data (ETL operations)
   Examples: "move data from A to B", "transform customer records", "migrate the database"

4. analytics - User wants aggregations, metrics, reports, statistical analysis
   Examples: "analyze sales trends", "calculate average revenue", "show top 10 customers"

5. relationship_query - User wants to understand foreign keys, relationships, joins between tables
   Examples: "how are these tables related", "find foreign keys", "what connects orders to customers"

6. query_generation - User wants to generate or write queries
   Examples: "write a query to find X", "generate SQL for Y", "select all customers where Z"

7. document_search - User wants to search documents or perform text searches
   Examples: "search for documents containing X", "find text matching Y", "full-text search"

8. api_call - User wants to make HTTP/REST API calls
   Examples: "call the user API", "make a GET request to X", "post data to the endpoint"

9. unknown - Intent doesn't clearly match any category

User message: "{message}"

Classify this intent. Respond ONLY with valid JSON (no markdown, no code blocks):
{
  "intent": "<category_name>",
  "confidence": <0.0-1.0>,
  "reasoning": "<brief explanation>"
}"#;

/// LLM classifier settings
#[derive(Debug, Clone)]
pub struct LlmClassifierConfig {
    pub enable_cache: bool,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    /// Upper bound on one provider call; `None` leaves it to the caller
    pub call_timeout: Option<Duration>,
}

impl Default for LlmClassifierConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_ttl: Duration::from_secs(15 * 60),
            cache_max_entries: 5000,
            call_timeout: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

/// Build the classification prompt for a message
///
/// The backend type comes from `context["backend_type"]`, defaulting to
/// `unknown`.
pub fn build_classification_prompt(message: &str, context: &ContextData) -> String {
    let backend_type = context
        .get("backend_type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    CLASSIFICATION_PROMPT
        .replace("{backend_type}", backend_type)
        .replace("{message}", message)
}

/// Parse the model's JSON answer
///
/// Tolerates a surrounding code fence, rejects unknown categories and clamps
/// confidence to `[0, 1]`.
pub fn parse_classification_response(content: &str) -> Result<Classification, LlmError> {
    let mut body = content.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    let body = body.trim();

    let raw: RawClassification = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("not a classification object: {}", e)))?;
    let intent: IntentCategory = raw
        .intent
        .parse()
        .map_err(|_| LlmError::InvalidResponse(format!("invalid intent '{}'", raw.intent)))?;
    let confidence = if raw.confidence.is_nan() {
        0.0
    } else {
        raw.confidence.clamp(0.0, 1.0)
    };

    debug!(intent = %intent, confidence, reasoning = %raw.reasoning, "Parsed LLM classification");
    Ok(Classification::new(intent, confidence))
}

/// Intent classifier backed by an LLM
pub struct LlmIntentClassifier {
    provider: Arc<dyn LlmProvider>,
    config: LlmClassifierConfig,
    cache: Option<ClassificationCache>,
    fallback: KeywordClassifier,
}

impl LlmIntentClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self::with_config(provider, LlmClassifierConfig::default())
    }

    pub fn with_config(provider: Arc<dyn LlmProvider>, config: LlmClassifierConfig) -> Self {
        let cache = config
            .enable_cache
            .then(|| ClassificationCache::new(config.cache_ttl, config.cache_max_entries));
        Self {
            provider,
            config,
            cache,
            fallback: KeywordClassifier::new(),
        }
    }

    pub fn config(&self) -> &LlmClassifierConfig {
        &self.config
    }

    /// Number of cached classifications
    pub fn cached_count(&self) -> usize {
        self.cache.as_ref().map_or(0, ClassificationCache::len)
    }

    async fn classify_with_llm(
        &self,
        message: &str,
        context: &ContextData,
    ) -> Result<Classification, LlmError> {
        let messages = [ChatMessage::user(build_classification_prompt(message, context))];
        let call = self.provider.chat(&messages, None);

        let response = match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| LlmError::Timeout(format!("no answer within {:?}", limit)))??,
            None => call.await?,
        };

        parse_classification_response(&response.content)
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, message: &str, context: &ContextData) -> Classification {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(message)) {
            debug!(intent = %cached.intent, "LLM classification cache hit");
            return cached;
        }

        match self.classify_with_llm(message, context).await {
            Ok(classification) => {
                info!(
                    intent = %classification.intent,
                    confidence = classification.confidence,
                    provider = self.provider.name(),
                    "LLM classification successful"
                );
                if let Some(cache) = &self.cache {
                    cache.insert(message, classification);
                }
                classification
            }
            Err(e) => {
                warn!(error = %e, "LLM classification failed, falling back to keyword rules");
                self.fallback.classify_message(message)
            }
        }
    }
}

impl std::fmt::Debug for LlmIntentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmIntentClassifier")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("cached", &self.cached_count())
            .finish()
    }
}
