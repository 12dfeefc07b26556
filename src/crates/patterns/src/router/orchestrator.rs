//! Intent orchestrator
//!
//! Owns a shared [`Library`] plus the active classifier and planner. Both
//! strategies can be swapped at runtime through setters; readers clone the
//! current `Arc` out of the lock before awaiting.

use super::keyword::KeywordClassifier;
use super::planner::StaticPlanner;
use super::{
    Classification, ContextData, ExecutionPlan, ExecutionPlanner, IntentCategory,
    IntentClassifier,
};
use crate::error::Result;
use crate::library::Library;
use crate::observability::{SpanGuard, Tracer};
use crate::tracking::{EffectivenessTracker, PatternUsage, RequestContext, UsageOutcome};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Highest confidence a recommendation may claim
pub const MAX_RECOMMENDATION_CONFIDENCE: f64 = 0.9;

const INTENT_MATCH_BONUS: f64 = 0.4;
const USE_CASE_BONUS: f64 = 0.3;
const TITLE_BONUS: f64 = 0.2;
const DESCRIPTION_BONUS: f64 = 0.1;

/// Best library pattern for a request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternRecommendation {
    pub pattern_name: String,
    /// Confidence in `(0, 0.9]`
    pub confidence: f64,
    /// Number of candidates with a positive score
    pub candidates: usize,
}

/// Everything the orchestrator derives from one message
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub classification: Classification,
    /// `None` when no plan exists for the intent
    pub plan: Option<ExecutionPlan>,
    pub recommendation: Option<PatternRecommendation>,
    pub routing_hint: &'static str,
}

/// Classifies requests, plans execution and recommends patterns
pub struct Orchestrator {
    library: Arc<Library>,
    classifier: RwLock<Arc<dyn IntentClassifier>>,
    planner: RwLock<Arc<dyn ExecutionPlanner>>,
    tracker: RwLock<Option<Arc<dyn EffectivenessTracker>>>,
    tracer: Arc<dyn Tracer>,
}

impl Orchestrator {
    /// Create an orchestrator with the keyword classifier and static planner
    pub fn new(library: Arc<Library>) -> Self {
        let tracer = library.tracer();
        Self {
            library,
            classifier: RwLock::new(Arc::new(KeywordClassifier::new())),
            planner: RwLock::new(Arc::new(StaticPlanner::new())),
            tracker: RwLock::new(None),
            tracer,
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_tracker(self, tracker: Arc<dyn EffectivenessTracker>) -> Self {
        *self.tracker.write() = Some(tracker);
        self
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// Replace the intent classifier
    pub fn set_intent_classifier(&self, classifier: Arc<dyn IntentClassifier>) {
        *self.classifier.write() = classifier;
        debug!("Intent classifier replaced");
    }

    /// Replace the execution planner
    pub fn set_execution_planner(&self, planner: Arc<dyn ExecutionPlanner>) {
        *self.planner.write() = planner;
        debug!("Execution planner replaced");
    }

    pub fn set_effectiveness_tracker(&self, tracker: Option<Arc<dyn EffectivenessTracker>>) {
        *self.tracker.write() = tracker;
    }

    /// Classify a message with the active classifier
    pub async fn classify_intent(&self, message: &str, context: &ContextData) -> Classification {
        let classifier = Arc::clone(&*self.classifier.read());

        let mut span = SpanGuard::new(self.tracer.as_ref(), "patterns.orchestrator.classify_intent");
        span.set_attribute("message.length", message.len());

        let classification = classifier.classify(message, context).await;

        span.set_attribute("intent.category", classification.intent);
        span.set_attribute("intent.confidence", format!("{:.2}", classification.confidence));
        self.tracer.record_metric(
            "patterns.orchestrator.classify_intent",
            1.0,
            &[("intent", classification.intent.as_str())],
        );
        classification
    }

    /// Build a plan for an intent with the active planner
    pub fn plan_execution(
        &self,
        intent: IntentCategory,
        message: &str,
        context: &ContextData,
    ) -> Result<ExecutionPlan> {
        let planner = Arc::clone(&*self.planner.read());

        let mut span = SpanGuard::new(self.tracer.as_ref(), "patterns.orchestrator.plan_execution");
        span.set_attribute("intent.category", intent);

        let result = planner.plan(intent, message, context);
        let outcome = match &result {
            Ok(plan) => {
                span.set_attribute("plan.steps", plan.steps.len());
                "success"
            }
            Err(e) => {
                span.record_error(e);
                "error"
            }
        };
        self.tracer.record_metric(
            "patterns.orchestrator.plan_execution",
            1.0,
            &[("intent", intent.as_str()), ("result", outcome)],
        );
        result
    }

    /// Human-readable routing advice for an intent
    pub fn routing_recommendation(&self, intent: IntentCategory) -> &'static str {
        match intent {
            IntentCategory::SchemaDiscovery => {
                "For schema discovery, prefer comprehensive discovery tools with caching. \
                 Check if schema is already cached before making expensive calls."
            }
            IntentCategory::DataQuality => {
                "For data quality assessment, consider using workflow patterns for comprehensive checks. \
                 For single validation rules, use individual quality check tools."
            }
            IntentCategory::DataTransform => {
                "For data transformation, use ETL workflow patterns with validation gates. \
                 Include source validation, transformation logic, and result verification."
            }
            IntentCategory::Analytics => {
                "For analytics queries, validate and estimate cost before execution. \
                 Consider using pattern library for complex analytics (ML, time series, advanced aggregations)."
            }
            IntentCategory::RelationshipQuery => {
                "For relationship queries, use schema inference tools with FK detection. \
                 Results include confidence scores for inferred relationships."
            }
            IntentCategory::QueryGeneration => {
                "For query generation, validate syntax and estimate cost before execution. \
                 Use patterns from library for complex query structures."
            }
            IntentCategory::DocumentSearch => {
                "For document search, use appropriate indexing and search patterns. \
                 Consider full-text search, vector similarity, or hybrid approaches."
            }
            IntentCategory::ApiCall => {
                "For API calls, validate request structure and handle responses with proper error handling. \
                 Use retry patterns for transient failures."
            }
            IntentCategory::Unknown => {
                "No specific routing recommendation available. Use default tool selection."
            }
        }
    }

    /// Pick the library pattern that best fits a message and intent
    ///
    /// Candidates come from [`Library::search`] and are rescored for intent
    /// alignment and substring matches. Blank messages and candidates with
    /// no positive score yield `None`.
    pub fn recommend_pattern(
        &self,
        message: &str,
        intent: IntentCategory,
    ) -> Option<PatternRecommendation> {
        let mut span =
            SpanGuard::new(self.tracer.as_ref(), "patterns.orchestrator.recommend_pattern");
        span.set_attribute("intent.category", intent);
        span.set_attribute("message.length", message.len());

        let lowered = message.trim().to_lowercase();
        let results = if lowered.is_empty() {
            Vec::new()
        } else {
            self.library.search(message)
        };
        span.set_attribute("search.result_count", results.len());
        let searched = !results.is_empty();

        let scored: Vec<(String, f64)> = results
            .into_iter()
            .filter_map(|summary| {
                let mut score = 0.0;
                if matches_intent(&summary.category, intent) {
                    score += INTENT_MATCH_BONUS;
                }
                if summary
                    .use_cases
                    .iter()
                    .any(|u| u.to_lowercase().contains(&lowered))
                {
                    score += USE_CASE_BONUS;
                }
                if summary.title.to_lowercase().contains(&lowered) {
                    score += TITLE_BONUS;
                }
                if summary.description.to_lowercase().contains(&lowered) {
                    score += DESCRIPTION_BONUS;
                }
                (score > 0.0).then_some((summary.name, score))
            })
            .collect();

        let candidates = scored.len();
        // First candidate wins ties, keeping search rank order.
        let best = scored.into_iter().fold(None, |best: Option<(String, f64)>, item| {
            match best {
                Some(b) if b.1 >= item.1 => Some(b),
                _ => Some(item),
            }
        });

        let outcome = match (&best, searched) {
            (Some(_), _) => "success",
            (None, true) => "no_scored_match",
            (None, false) => "no_match",
        };
        span.set_attribute("recommendation.result", outcome);
        self.tracer.record_metric(
            "patterns.orchestrator.recommend_pattern",
            1.0,
            &[("intent", intent.as_str()), ("result", outcome)],
        );

        let (pattern_name, score) = best?;
        let confidence = score.min(MAX_RECOMMENDATION_CONFIDENCE);
        span.set_attribute("recommendation.pattern", &pattern_name);
        span.set_attribute("recommendation.confidence", format!("{:.2}", confidence));
        span.set_attribute("recommendation.candidates", candidates);

        Some(PatternRecommendation {
            pattern_name,
            confidence,
            candidates,
        })
    }

    /// Classify, plan and recommend in one call
    pub async fn route(&self, message: &str, context: &ContextData) -> RoutingDecision {
        let classification = self.classify_intent(message, context).await;
        let plan = match classification.intent {
            IntentCategory::Unknown => None,
            intent => self.plan_execution(intent, message, context).ok(),
        };
        let recommendation = self.recommend_pattern(message, classification.intent);

        info!(
            intent = %classification.intent,
            confidence = classification.confidence,
            planned = plan.is_some(),
            pattern = recommendation.as_ref().map(|r| r.pattern_name.as_str()),
            "Routed request"
        );

        RoutingDecision {
            classification,
            plan,
            recommendation,
            routing_hint: self.routing_recommendation(classification.intent),
        }
    }

    /// Report a pattern use to the attached tracker
    ///
    /// Variant and domain come from `ctx`. Does nothing without a tracker.
    pub fn record_pattern_usage(
        &self,
        ctx: &RequestContext,
        pattern_name: &str,
        outcome: UsageOutcome,
    ) {
        let Some(tracker) = self.tracker.read().clone() else {
            return;
        };

        let usage = PatternUsage::from_outcome(pattern_name, ctx, outcome);
        {
            let mut span =
                SpanGuard::new(self.tracer.as_ref(), "patterns.orchestrator.record_usage");
            span.set_attribute("pattern.name", pattern_name);
            span.set_attribute("pattern.variant", &usage.variant);
            span.set_attribute("pattern.domain", &usage.domain);
            span.set_attribute("agent.id", &usage.agent_id);
            span.set_attribute("success", usage.success);
            span.set_attribute("cost_usd", format!("{:.6}", usage.cost_usd));
            span.set_attribute("latency_ms", format!("{:.2}", usage.latency.as_secs_f64() * 1000.0));
            if let Some(error_type) = &usage.error_type {
                span.set_attribute("error.type", error_type);
            }
            if !usage.llm_provider.is_empty() {
                span.set_attribute("llm.provider", &usage.llm_provider);
                span.set_attribute("llm.model", &usage.llm_model);
            }
        }

        let variant = usage.variant.clone();
        let success = if usage.success { "true" } else { "false" };
        tracker.record_usage(usage);

        self.tracer.record_metric(
            "patterns.orchestrator.usage_recorded",
            1.0,
            &[("pattern", pattern_name), ("variant", variant.as_str()), ("success", success)],
        );
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("library", &self.library)
            .field("tracker", &self.tracker.read().is_some())
            .finish()
    }
}

/// Whether a pattern category lines up with an intent
fn matches_intent(category: &str, intent: IntentCategory) -> bool {
    let category = category.to_lowercase();
    if category == intent.as_str() {
        return true;
    }

    let synonyms: &[&str] = match intent {
        IntentCategory::Analytics => &["analytics", "aggregation", "reporting"],
        IntentCategory::DataQuality => &["data_quality", "validation", "quality"],
        IntentCategory::DataTransform => &["etl", "transform", "data_transform"],
        IntentCategory::SchemaDiscovery => &["schema", "metadata", "discovery"],
        _ => &[],
    };
    synonyms.contains(&category.as_str())
}
