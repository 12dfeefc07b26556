//! Free-text search over pattern summaries

use crate::pattern::PatternSummary;
use serde::Serialize;
use std::cmp::Ordering;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with",
];

const NAME_BONUS: f64 = 0.5;
const TITLE_BONUS: f64 = 0.3;

/// A ranked search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub summary: PatternSummary,
    pub score: f64,
    /// Number of query tokens found in the searchable text
    pub matched: usize,
}

/// Split a query into lowercase search tokens
///
/// Stop words and tokens of two characters or fewer are dropped. When that
/// leaves nothing, the whole lowercase query is the single token, so short
/// queries never match everything.
pub(crate) fn tokenize(query: &str) -> Vec<String> {
    let lowered = query.trim().to_lowercase();
    let tokens: Vec<String> = lowered
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '-' | '_'))
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect();

    if tokens.is_empty() && !lowered.is_empty() {
        return vec![lowered];
    }
    tokens
}

fn searchable_text(summary: &PatternSummary) -> String {
    let mut text = format!(
        "{} {} {} {}",
        summary.name,
        summary.title,
        summary.description,
        summary.backend_function.as_deref().unwrap_or_default()
    );
    for use_case in &summary.use_cases {
        text.push(' ');
        text.push_str(use_case);
    }
    text.to_lowercase()
}

/// Score one summary against query tokens; `None` when nothing matches
pub(crate) fn score(summary: &PatternSummary, tokens: &[String]) -> Option<(f64, usize)> {
    if tokens.is_empty() {
        return None;
    }

    let text = searchable_text(summary);
    let matched = tokens.iter().filter(|t| text.contains(t.as_str())).count();
    if matched == 0 {
        return None;
    }

    let name = summary.name.to_lowercase();
    let title = summary.title.to_lowercase();
    let mut score = matched as f64 / tokens.len() as f64;
    for token in tokens {
        if name.contains(token.as_str()) {
            score += NAME_BONUS;
        }
        if title.contains(token.as_str()) {
            score += TITLE_BONUS;
        }
    }
    Some((score, matched))
}

/// Rank summaries against a query, best first
pub(crate) fn rank(index: Vec<PatternSummary>, query: &str) -> Vec<SearchHit> {
    let tokens = tokenize(query);
    let mut hits: Vec<SearchHit> = index
        .into_iter()
        .filter_map(|summary| {
            score(&summary, &tokens).map(|(score, matched)| SearchHit {
                summary,
                score,
                matched,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.matched.cmp(&a.matched))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn summary(name: &str, title: &str, description: &str) -> PatternSummary {
        PatternSummary {
            name: name.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: "analytics".to_string(),
            difficulty: String::new(),
            backend_type: String::new(),
            use_cases: Vec::new(),
            backend_function: None,
        }
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        assert_eq!(
            tokenize("How to optimize the joins, for big-tables"),
            vec!["how", "optimize", "joins", "big", "tables"]
        );
        assert_eq!(tokenize("sql_joins"), vec!["sql", "joins"]);
    }

    #[test]
    fn test_tokenize_falls_back_to_whole_query() {
        assert_eq!(tokenize("ML"), vec!["ml"]);
        assert_eq!(tokenize("to be"), vec!["to be"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_name_match_outranks_description_match() {
        let by_name = summary("joins_guide", "Guide", "About queries");
        let by_description = summary("guide", "Guide", "About joins");
        let tokens = tokenize("joins");

        let (name_score, _) = score(&by_name, &tokens).unwrap();
        let (description_score, _) = score(&by_description, &tokens).unwrap();
        assert!(name_score - description_score >= 0.5);
    }

    #[test]
    fn test_rank_orders_by_score_then_matches() {
        let index = vec![
            summary("other", "Other", "nothing relevant"),
            summary("window", "Window functions", "rank rows over partitions"),
            summary("sql_joins", "SQL joins", "join large tables"),
        ];

        let hits = rank(index, "sql joins");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].summary.name, "sql_joins");
        assert_eq!(hits[0].matched, 2);
    }

    #[test]
    fn test_backend_function_and_use_cases_are_searchable() {
        let mut s = summary("npath", "Path analysis", "Sequences");
        s.backend_function = Some("NPath".to_string());
        s.use_cases = vec!["funnel analysis".to_string()];

        assert!(score(&s, &tokenize("funnel")).is_some());
        assert!(score(&s, &tokenize("npath")).is_some());
    }

    proptest! {
        #[test]
        fn prop_scores_are_positive_and_bounded(query in "[a-z ]{0,40}") {
            let tokens = tokenize(&query);
            let s = summary("sql_joins", "SQL joins", "join large tables quickly");
            if let Some((score, matched)) = score(&s, &tokens) {
                prop_assert!(score > 0.0);
                prop_assert!(matched >= 1 && matched <= tokens.len());
                prop_assert!(score <= 1.0 + tokens.len() as f64 * 0.8);
            }
        }
    }
}
