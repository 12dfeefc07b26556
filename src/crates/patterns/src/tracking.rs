//! Pattern effectiveness tracking
//!
//! The orchestrator reports each pattern use to an optional
//! [`EffectivenessTracker`]. Variant and domain come from the
//! request-scoped [`RequestContext`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Session id used when a request carries none
pub const DEFAULT_SESSION_ID: &str = "default";
/// Variant reported when a request carries no pattern metadata
pub const DEFAULT_VARIANT: &str = "default";
/// Domain reported when a request carries no pattern metadata
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Pattern selected for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMetadata {
    pub name: String,
    pub variant: String,
    pub domain: String,
}

impl PatternMetadata {
    pub fn new(
        name: impl Into<String>,
        variant: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            variant: variant.into(),
            domain: domain.into(),
        }
    }
}

/// Request-scoped values the core reads
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session_id: Option<String>,
    pattern: Option<PatternMetadata>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_pattern(mut self, pattern: PatternMetadata) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn session_id(&self) -> &str {
        self.session_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SESSION_ID)
    }

    pub fn pattern(&self) -> Option<&PatternMetadata> {
        self.pattern.as_ref()
    }

    pub fn variant(&self) -> &str {
        self.pattern
            .as_ref()
            .map(|p| p.variant.as_str())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VARIANT)
    }

    pub fn domain(&self) -> &str {
        self.pattern
            .as_ref()
            .map(|p| p.domain.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or(UNKNOWN_DOMAIN)
    }
}

/// Outcome of executing with a pattern, as reported by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageOutcome {
    pub agent_id: String,
    pub success: bool,
    pub cost_usd: f64,
    pub latency: Duration,
    pub error_type: Option<String>,
    pub llm_provider: String,
    pub llm_model: String,
    pub judge_result: Option<serde_json::Value>,
}

/// One usage record sent to a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternUsage {
    pub pattern_name: String,
    pub variant: String,
    pub domain: String,
    pub agent_id: String,
    pub success: bool,
    pub cost_usd: f64,
    pub latency: Duration,
    pub error_type: Option<String>,
    pub llm_provider: String,
    pub llm_model: String,
    pub judge_result: Option<serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

impl PatternUsage {
    /// Combine a caller outcome with request context
    pub fn from_outcome(pattern_name: &str, ctx: &RequestContext, outcome: UsageOutcome) -> Self {
        Self {
            pattern_name: pattern_name.to_string(),
            variant: ctx.variant().to_string(),
            domain: ctx.domain().to_string(),
            agent_id: outcome.agent_id,
            success: outcome.success,
            cost_usd: outcome.cost_usd,
            latency: outcome.latency,
            error_type: outcome.error_type,
            llm_provider: outcome.llm_provider,
            llm_model: outcome.llm_model,
            judge_result: outcome.judge_result,
            recorded_at: Utc::now(),
        }
    }
}

/// Receiver of pattern usage reports
///
/// Calls are fire-and-forget; implementations must not block.
pub trait EffectivenessTracker: Send + Sync {
    fn record_usage(&self, usage: PatternUsage);
}

/// Aggregated usage for one pattern variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub calls: u64,
    pub successes: u64,
    pub total_cost_usd: f64,
    pub total_latency: Duration,
}

impl UsageStats {
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.successes as f64 / self.calls as f64
    }

    pub fn average_latency(&self) -> Duration {
        if self.calls == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_latency.as_nanos() / u128::from(self.calls);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Tracker that keeps usage records in memory
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    records: Mutex<Vec<PatternUsage>>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PatternUsage> {
        self.records.lock().clone()
    }

    /// Stats per variant for a pattern
    pub fn stats(&self, pattern_name: &str) -> HashMap<String, UsageStats> {
        let mut stats: HashMap<String, UsageStats> = HashMap::new();
        for usage in self
            .records
            .lock()
            .iter()
            .filter(|u| u.pattern_name == pattern_name)
        {
            let entry = stats.entry(usage.variant.clone()).or_default();
            entry.calls += 1;
            if usage.success {
                entry.successes += 1;
            }
            entry.total_cost_usd += usage.cost_usd;
            entry.total_latency += usage.latency;
        }
        stats
    }
}

impl EffectivenessTracker for InMemoryTracker {
    fn record_usage(&self, usage: PatternUsage) {
        self.records.lock().push(usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.session_id(), "default");
        assert_eq!(ctx.variant(), "default");
        assert_eq!(ctx.domain(), "unknown");

        let ctx = RequestContext::new()
            .with_session_id("s-1")
            .with_pattern(PatternMetadata::new("sql_joins", "v2", "sql"));
        assert_eq!(ctx.session_id(), "s-1");
        assert_eq!(ctx.variant(), "v2");
        assert_eq!(ctx.domain(), "sql");
    }

    #[test]
    fn test_stats_per_variant() {
        let tracker = InMemoryTracker::new();
        let ctx = RequestContext::new().with_pattern(PatternMetadata::new("p", "v2", "sql"));
        for success in [true, true, false] {
            tracker.record_usage(PatternUsage::from_outcome(
                "p",
                &ctx,
                UsageOutcome {
                    success,
                    cost_usd: 0.5,
                    latency: Duration::from_millis(30),
                    ..Default::default()
                },
            ));
        }

        let stats = tracker.stats("p");
        let v2 = stats["v2"];
        assert_eq!(v2.calls, 3);
        assert!((v2.success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!((v2.total_cost_usd - 1.5).abs() < 1e-9);
        assert_eq!(v2.average_latency(), Duration::from_millis(30));
        assert!(tracker.stats("other").is_empty());
    }

    #[test]
    fn test_average_latency_with_huge_call_count() {
        let stats = UsageStats {
            calls: u64::from(u32::MAX) + 1,
            total_latency: Duration::from_secs(1 << 32),
            ..UsageStats::default()
        };
        assert_eq!(stats.average_latency(), Duration::from_secs(1));
    }
}
