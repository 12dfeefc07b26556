//! Integration tests for AbTestingLibrary

mod common;

use common::*;
use patterns::variant::{new_canary_selector, ExplicitSelector, HashSelector};
use patterns::{AbTestingLibrary, PatternError, RequestContext, VariantSelector};
use std::sync::Arc;

#[test]
fn test_variants_discovered_from_index() {
    let (dir, library) = setup_library();
    write_pattern(dir.path(), "sql_joins.v3.yaml", &simple_pattern("sql_joins.v3", "analytics", "Joins v3"));
    let ab = AbTestingLibrary::new(library);

    assert_eq!(ab.variants("sql_joins"), vec!["default", "v2", "v3"]);
    assert!(ab.variants("duplicate_check").is_empty());
    assert!(ab.variants("sql").is_empty());
}

#[test]
fn test_explicit_selection_loads_variant() {
    let (_dir, library) = setup_library();
    let ab = AbTestingLibrary::new(library).with_selector(Arc::new(ExplicitSelector::new("v2")));

    let selection = ab.load_for_session("sql_joins", "anyone").unwrap();
    assert_eq!(selection.variant, "v2");
    assert_eq!(selection.base_name, "sql_joins");
    assert_eq!(selection.pattern.name, "sql_joins.v2");

    let metadata = selection.metadata("sql");
    assert_eq!(metadata.name, "sql_joins");
    assert_eq!(metadata.variant, "v2");
}

#[test]
fn test_pattern_without_variants_uses_base() {
    let (_dir, library) = setup_library();
    let ab = AbTestingLibrary::new(library).with_selector(Arc::new(ExplicitSelector::new("v9")));

    let selection = ab.load("duplicate_check", &RequestContext::new()).unwrap();
    assert_eq!(selection.variant, "default");
    assert_eq!(selection.pattern.name, "duplicate_check");
}

#[test]
fn test_hash_selection_is_sticky() {
    let (_dir, library) = setup_library();
    let ab = AbTestingLibrary::new(library);

    let ctx = RequestContext::new().with_session_id("user-1234");
    let first = ab.load("sql_joins", &ctx).unwrap().variant;
    for _ in 0..5 {
        assert_eq!(ab.load("sql_joins", &ctx).unwrap().variant, first);
    }

    let variants = ab.variants("sql_joins");
    let expected = HashSelector::new()
        .select_variant("sql_joins", &variants, "user-1234")
        .unwrap();
    assert_eq!(first, expected);
}

#[test]
fn test_load_with_variant_falls_back_to_base() {
    let (_dir, library) = setup_library();
    let ab = AbTestingLibrary::new(library);

    let missing = ab.load_with_variant("sql_joins", "v7").unwrap();
    assert_eq!(missing.variant, "default");
    assert_eq!(missing.pattern.name, "sql_joins");

    let explicit = ab.load_with_variant("sql_joins", "v2").unwrap();
    assert_eq!(explicit.pattern.title, "SQL Join Optimization (hash joins)");

    let err = ab.load_with_variant("nope", "v2").unwrap_err();
    assert!(matches!(err, PatternError::NotFound(_)));
}

#[test]
fn test_canary_rollout_over_library() {
    let (_dir, library) = setup_library();
    let selector = new_canary_selector("default", "v2", 0.10).with_seed(42);
    let ab = AbTestingLibrary::new(library).with_selector(Arc::new(selector));

    let treatment = (0..1000)
        .filter(|i| {
            ab.load_for_session("sql_joins", &format!("session-{}", i))
                .unwrap()
                .variant
                == "v2"
        })
        .count();
    assert!((50..=150).contains(&treatment), "treatment count {}", treatment);
}
