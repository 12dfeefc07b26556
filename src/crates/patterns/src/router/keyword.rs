//! Keyword-rule intent classifier

use super::{Classification, ContextData, IntentCategory, IntentClassifier};
use async_trait::async_trait;

/// Ordered rule table; the first rule with a matching keyword wins
const RULES: &[(IntentCategory, &[&str], f64)] = &[
    (
        IntentCategory::SchemaDiscovery,
        &[
            "what tables",
            "list tables",
            "show tables",
            "what columns",
            "schema",
            "table structure",
            "describe",
        ],
        0.90,
    ),
    (
        IntentCategory::RelationshipQuery,
        &[
            "related",
            "foreign key",
            "relationship",
            "connected to",
            "references",
            "joins",
        ],
        0.85,
    ),
    (
        IntentCategory::DataQuality,
        &[
            "data quality",
            "duplicates",
            "null",
            "completeness",
            "validate",
            "check quality",
            "integrity",
        ],
        0.90,
    ),
    (
        IntentCategory::DataTransform,
        &[
            "move data",
            "copy",
            "load data",
            "extract",
            "transform",
            "etl",
            "migrate",
            "transfer",
        ],
        0.85,
    ),
    (
        IntentCategory::Analytics,
        &[
            "aggregate",
            "sum",
            "count",
            "average",
            "group by",
            "analyze",
            "report",
            "metrics",
            "statistics",
        ],
        0.80,
    ),
    (
        IntentCategory::QueryGeneration,
        &[
            "write query",
            "generate query",
            "query for",
            "select",
            "find",
            "get data",
        ],
        0.75,
    ),
    (
        IntentCategory::DocumentSearch,
        &[
            "search document",
            "find in document",
            "document query",
            "text search",
            "full text",
        ],
        0.80,
    ),
    (
        IntentCategory::ApiCall,
        &["api call", "http request", "rest api", "endpoint", "webhook"],
        0.85,
    ),
];

/// Deterministic classifier over a fixed keyword table
///
/// Matching is case-insensitive substring search. No match yields
/// `(unknown, 0.0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_message(&self, message: &str) -> Classification {
        let lowered = message.to_lowercase();
        RULES
            .iter()
            .find(|(_, keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(intent, _, confidence)| Classification::new(*intent, *confidence))
            .unwrap_or_else(Classification::unknown)
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, message: &str, _context: &ContextData) -> Classification {
        self.classify_message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> (IntentCategory, f64) {
        let c = KeywordClassifier::new().classify_message(message);
        (c.intent, c.confidence)
    }

    #[test]
    fn test_keyword_table() {
        assert_eq!(
            classify("calculate average revenue by region"),
            (IntentCategory::Analytics, 0.80)
        );
        assert_eq!(
            classify("What tables are in the warehouse?"),
            (IntentCategory::SchemaDiscovery, 0.90)
        );
        assert_eq!(
            classify("find duplicates in orders"),
            (IntentCategory::DataQuality, 0.90)
        );
        assert_eq!(
            classify("migrate customers to the new cluster"),
            (IntentCategory::DataTransform, 0.85)
        );
        assert_eq!(
            classify("write query for top sellers"),
            (IntentCategory::QueryGeneration, 0.75)
        );
        assert_eq!(
            classify("run a full text lookup"),
            (IntentCategory::DocumentSearch, 0.80)
        );
        assert_eq!(
            classify("trigger the webhook"),
            (IntentCategory::ApiCall, 0.85)
        );
    }

    #[test]
    fn test_rule_order_decides_ties() {
        // "schema" and "count" both match; schema discovery comes first.
        assert_eq!(
            classify("count the columns in this schema").0,
            IntentCategory::SchemaDiscovery
        );
        assert_eq!(
            classify("how are orders related to customers").0,
            IntentCategory::RelationshipQuery
        );
    }

    #[test]
    fn test_no_match_is_unknown() {
        assert_eq!(classify("hello there"), (IntentCategory::Unknown, 0.0));
        assert_eq!(classify(""), (IntentCategory::Unknown, 0.0));
    }
}
