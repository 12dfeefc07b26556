//! Integration tests for Library
//!
//! Loading across sources, index lifecycle, search ranking and filters.

mod common;

use common::*;
use parking_lot::Mutex;
use patterns::{
    EmbeddedSource, Library, PatternError, PatternSource, RecordingTracer, SourceKind,
};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;

#[test]
fn test_load_is_cache_coherent() {
    let (_dir, library) = setup_library();

    let first = library.load("sql_joins").unwrap();
    let second = library.load("sql_joins").unwrap();
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.category, "analytics");
    assert_eq!(first.use_cases[0], "optimize joins");
}

#[test]
fn test_load_finds_subdirectory_and_yml() {
    let (_dir, library) = setup_library();
    let pattern = library.load("duplicate_check").unwrap();
    assert_eq!(pattern.title, "Duplicate Detection");
    assert!(library.is_cached("duplicate_check"));
}

#[test]
fn test_load_missing_is_not_found() {
    let (_dir, library) = setup_library();
    let err = library.load("does_not_exist").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_load_malformed_yaml_is_parse_error() {
    let (dir, library) = setup_library();
    write_pattern(dir.path(), "corrupt.yaml", "name: [unterminated\n");
    let err = library.load("corrupt").unwrap_err();
    assert!(matches!(err, PatternError::Parse { .. }));
}

#[test]
fn test_path_escape_fails_closed() {
    let outer = tempfile::tempdir().unwrap();
    let root = outer.path().join("root");
    std::fs::create_dir_all(&root).unwrap();
    write_pattern(outer.path(), "secret.yaml", &simple_pattern("secret", "analytics", "Secret"));

    let library = Library::with_directory(&root);
    let err = library.load("../secret").unwrap_err();
    assert!(matches!(err, PatternError::PathEscape(_)), "got {:?}", err);
    assert!(!library.is_cached("../secret"));
}

#[test]
fn test_embedded_source_takes_priority() {
    let dir = setup_patterns_dir();
    let embedded = EmbeddedSource::new().with_file(
        "analytics/sql_joins.yaml",
        simple_pattern("sql_joins", "analytics", "Bundled Joins"),
    );
    let library = Library::with_directory(dir.path()).with_embedded(embedded);

    assert_eq!(library.load("sql_joins").unwrap().title, "Bundled Joins");

    let all = library.list_all();
    let joins: Vec<_> = all.iter().filter(|s| s.name == "sql_joins").collect();
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].title, "Bundled Joins");
}

#[test]
fn test_list_all_skips_corrupt_files() {
    let (dir, library) = setup_library();
    write_pattern(dir.path(), "corrupt.yaml", ": : :\n  - [\n");
    write_pattern(dir.path(), "notes.txt", "not a pattern");
    write_pattern(dir.path(), ".hidden.yaml", &simple_pattern("hidden", "analytics", "Hidden"));

    let mut names: Vec<String> = library.list_all().into_iter().map(|s| s.name).collect();
    names.sort();
    assert_eq!(names, vec!["duplicate_check", "sql_joins", "sql_joins.v2"]);
}

#[test]
fn test_clear_cache_resets_index() {
    let (dir, library) = setup_library();
    assert!(!library.is_index_built());

    assert_eq!(library.list_all().len(), 3);
    assert!(library.is_index_built());
    assert_eq!(library.cached_count(), 3);

    library.clear_cache();
    assert!(!library.is_index_built());
    assert_eq!(library.cached_count(), 0);

    write_pattern(dir.path(), "etl/copy_table.yaml", &simple_pattern("copy_table", "etl", "Copy Table"));
    assert_eq!(library.list_all().len(), 4);
    assert!(library.is_index_built());
}

#[test]
fn test_scenario_search_and_filter() {
    let (_dir, library) = setup_library();

    let hits = library.search("joins");
    assert!(hits.iter().any(|s| s.name == "sql_joins"));
    assert!(hits.iter().all(|s| s.name != "duplicate_check"));

    assert!(library.search("unrelated term").is_empty());

    let analytics = library.filter_by_category("analytics");
    assert!(analytics.iter().any(|s| s.name == "sql_joins"));
    assert_eq!(library.filter_by_category("ANALYTICS").len(), analytics.len());
}

#[test]
fn test_empty_query_returns_whole_index() {
    let (_dir, library) = setup_library();
    let mut searched: Vec<String> = library.search("").into_iter().map(|s| s.name).collect();
    let mut listed: Vec<String> = library.list_all().into_iter().map(|s| s.name).collect();
    searched.sort();
    listed.sort();
    assert_eq!(searched, listed);

    // Whitespace-only queries have no terms and behave like the empty query.
    let mut blank: Vec<String> = library.search(" \t ").into_iter().map(|s| s.name).collect();
    blank.sort();
    assert_eq!(blank, listed);
}

#[test]
fn test_name_match_outranks_description_match() {
    let embedded = EmbeddedSource::new()
        .with_file(
            "widget_rollup.yaml",
            "name: widget_rollup\ntitle: Rollup\ndescription: Sums rows\ncategory: analytics\nbest_practices: x\n",
        )
        .with_file(
            "rollup.yaml",
            "name: rollup\ntitle: Rollup\ndescription: Sums widget rows\ncategory: analytics\nbest_practices: x\n",
        );
    let library = Library::new().with_embedded(embedded);

    let hits = library.search_scored("widget");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].summary.name, "widget_rollup");
    assert!(hits[0].score - hits[1].score >= 0.5 - 1e-9);
}

#[test]
fn test_stop_words_fall_back_to_whole_query() {
    let embedded = EmbeddedSource::new().with_file(
        "the_and.yaml",
        "name: the_and\ntitle: Mixed\ndescription: odd\ncategory: text\nbest_practices: x\n",
    );
    let library = Library::new().with_embedded(embedded);

    // Every token is dropped, so the lowercased query itself is matched.
    assert_eq!(library.search("THE AND").len(), 0);
    assert_eq!(library.search("the_and").len(), 1);
}

#[test]
fn test_filters_with_empty_value_return_everything() {
    let (_dir, library) = setup_library();
    let all = library.list_all().len();
    assert_eq!(library.filter_by_backend_type("").len(), all);
    assert_eq!(library.filter_by_difficulty("").len(), all);
    assert_eq!(library.filter_by_difficulty("Advanced").len(), 1);
    assert_eq!(library.filter_by_backend_type("sql").len(), 3);
}

#[test]
fn test_extra_search_path() {
    let dir = tempfile::tempdir().unwrap();
    write_pattern(dir.path(), "custom/area/special.yaml", &simple_pattern("special", "text", "Special"));

    let library = Library::with_directory(dir.path());
    assert!(library.load("special").unwrap_err().is_not_found());

    library.add_search_path("custom/area");
    assert_eq!(library.load("special").unwrap().title, "Special");
}

#[test]
fn test_operations_are_traced() {
    let dir = setup_patterns_dir();
    let tracer = Arc::new(RecordingTracer::new());
    let library = Library::with_directory(dir.path()).with_tracer(tracer.clone());

    library.load("sql_joins").unwrap();
    library.load("sql_joins").unwrap();
    library.search("joins");

    let span = tracer.last_span("patterns.library.load").unwrap();
    assert_eq!(span.attribute("cache"), Some("hit"));
    assert!(span.attribute("duration_ms").is_some());
    assert_eq!(tracer.metric_count("patterns.library.load"), 2);
    assert_eq!(tracer.metric_count("patterns.library.search"), 1);
}

/// Source that pauses the first read of `p.yaml` after copying its bytes
struct GatedSource {
    content: Mutex<String>,
    reached: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl GatedSource {
    fn pattern(title: &str) -> String {
        format!("name: p\ntitle: {}\ncategory: analytics\nbest_practices: x\n", title)
    }

    fn set_title(&self, title: &str) {
        *self.content.lock() = Self::pattern(title);
    }
}

impl PatternSource for GatedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Embedded
    }

    fn read(&self, relative: &Path) -> patterns::Result<Option<Vec<u8>>> {
        if relative != Path::new("p.yaml") {
            return Ok(None);
        }
        let bytes = self.content.lock().clone().into_bytes();
        let reached = self.reached.lock().take();
        if let Some(reached) = reached {
            reached.send(()).unwrap();
            let release = self.release.lock().take().unwrap();
            release.recv().unwrap();
        }
        Ok(Some(bytes))
    }

    fn list(&self) -> Vec<PathBuf> {
        vec![PathBuf::from("p.yaml")]
    }
}

#[test]
fn test_eviction_during_load_is_not_overwritten() {
    let (reached_tx, reached_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let source = Arc::new(GatedSource {
        content: Mutex::new(GatedSource::pattern("v1")),
        reached: Mutex::new(Some(reached_tx)),
        release: Mutex::new(Some(release_rx)),
    });
    let library = Arc::new(Library::new().with_source(source.clone()));

    let loader = {
        let library = Arc::clone(&library);
        thread::spawn(move || library.load("p").unwrap())
    };

    // The loader holds v1 bytes while the file changes and is evicted.
    reached_rx.recv().unwrap();
    source.set_title("v2");
    library.evict("p");
    release_tx.send(()).unwrap();

    assert_eq!(loader.join().unwrap().title, "v1");
    assert!(!library.is_cached("p"));
    assert_eq!(library.load("p").unwrap().title, "v2");
    assert!(library.is_cached("p"));
}
