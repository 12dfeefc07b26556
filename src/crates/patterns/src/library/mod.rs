//! Pattern library
//!
//! Resolves pattern names against bundled and filesystem sources, caches
//! parsed patterns, and lazily builds a searchable index.
//!
//! The pattern cache, the path cache (name to discovered source path) and
//! the index share one reader/writer lock. Cache and path entries are always
//! written together; the index is replaced wholesale.

pub mod hot_reload;
mod search;
mod source;

pub use hot_reload::{FileChange, HotReloadConfig, HotReloader, PatternUpdate, UpdateKind};
pub use search::SearchHit;
pub use source::{
    is_pattern_file, pattern_name_from_path, DirectorySource, EmbeddedSource, PatternSource,
    SourceKind,
};

use crate::error::{PatternError, Result};
use crate::observability::{NoOpTracer, SpanGuard, Tracer};
use crate::pattern::{Pattern, PatternSummary};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Domain subdirectories searched after the root, in order
pub const DEFAULT_SEARCH_PATHS: &[&str] = &[
    "analytics",
    "ml",
    "timeseries",
    "text",
    "data_quality",
    "rest_api",
    "document",
    "etl",
    "prompt_engineering",
    "code",
    "debugging",
    "vision",
    "evaluation",
    "sql/analytics",
    "sql/timeseries",
    "sql/data_quality",
    "sql/text",
    "postgres/analytics",
];

const EXTENSIONS: &[&str] = &["yaml", "yml"];

#[derive(Debug, Clone)]
struct CachedPath {
    source: usize,
    relative: PathBuf,
}

#[derive(Default)]
struct LibraryState {
    patterns: HashMap<String, Arc<Pattern>>,
    paths: HashMap<String, CachedPath>,
    index: Option<Arc<Vec<PatternSummary>>>,
    /// Bumped on every invalidation so a rebuild that raced one is discarded
    generation: u64,
}

/// Cached, searchable pattern library
pub struct Library {
    sources: Vec<Arc<dyn PatternSource>>,
    directory: Option<Arc<DirectorySource>>,
    search_paths: RwLock<Vec<String>>,
    state: RwLock<LibraryState>,
    tracer: Arc<dyn Tracer>,
}

impl Library {
    /// Create a library with no sources
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            directory: None,
            search_paths: RwLock::new(DEFAULT_SEARCH_PATHS.iter().map(|p| p.to_string()).collect()),
            state: RwLock::new(LibraryState::default()),
            tracer: Arc::new(NoOpTracer),
        }
    }

    /// Create a library backed by a patterns directory
    pub fn with_directory(root: impl Into<PathBuf>) -> Self {
        Self::new().with_patterns_dir(root)
    }

    /// Add bundled patterns; they take priority over every other source
    pub fn with_embedded(mut self, embedded: EmbeddedSource) -> Self {
        self.sources.insert(0, Arc::new(embedded));
        self
    }

    /// Add the filesystem tree watched by the hot reloader
    pub fn with_patterns_dir(mut self, root: impl Into<PathBuf>) -> Self {
        let directory = Arc::new(DirectorySource::new(root));
        self.sources.push(directory.clone());
        self.directory = Some(directory);
        self
    }

    /// Add a custom source, consulted after the existing ones
    pub fn with_source(mut self, source: Arc<dyn PatternSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Replace the subdirectory search list
    pub fn with_search_paths<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.search_paths.write() = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Append a subdirectory to the search list
    pub fn add_search_path(&self, path: impl Into<String>) {
        let path = path.into();
        let mut paths = self.search_paths.write();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    pub fn search_paths(&self) -> Vec<String> {
        self.search_paths.read().clone()
    }

    /// Root of the filesystem source, if any
    pub fn patterns_dir(&self) -> Option<&Path> {
        self.directory.as_deref().map(DirectorySource::root)
    }

    pub(crate) fn directory(&self) -> Option<&DirectorySource> {
        self.directory.as_deref()
    }

    pub(crate) fn tracer(&self) -> Arc<dyn Tracer> {
        Arc::clone(&self.tracer)
    }

    /// Load a pattern by name
    ///
    /// Resolution order: pattern cache, path cache, then every source in
    /// priority order across the root and each search path.
    pub fn load(&self, name: &str) -> Result<Arc<Pattern>> {
        let mut span = SpanGuard::new(self.tracer.as_ref(), "patterns.library.load");
        span.set_attribute("pattern.name", name);

        let result = self.resolve(name, &mut span);
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => {
                span.record_error(e);
                e.kind()
            }
        };
        self.tracer
            .record_metric("patterns.library.load", 1.0, &[("result", outcome)]);
        result
    }

    fn resolve(&self, name: &str, span: &mut SpanGuard<'_>) -> Result<Arc<Pattern>> {
        if name.trim().is_empty() {
            return Err(PatternError::NotFound(name.to_string()));
        }

        let (cached_path, generation) = {
            let state = self.state.read();
            if let Some(pattern) = state.patterns.get(name) {
                span.set_attribute("cache", "hit");
                return Ok(Arc::clone(pattern));
            }
            (state.paths.get(name).cloned(), state.generation)
        };
        span.set_attribute("cache", "miss");

        if let Some(cached) = cached_path {
            if let Some(pattern) = self.read_at(name, &cached) {
                span.set_attribute("source", "path_cache");
                return Ok(self.store(name, pattern, cached, generation));
            }
            debug!(pattern = name, "Cached path is stale, searching sources");
        }

        let candidates = self.candidate_paths(name);
        let mut parse_error = None;

        for (index, source) in self.sources.iter().enumerate() {
            for candidate in &candidates {
                let bytes = match source.read(candidate) {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => continue,
                    Err(e @ PatternError::PathEscape(_)) => {
                        warn!(pattern = name, path = %candidate.display(), "Rejected pattern path outside root");
                        return Err(e);
                    }
                    Err(e) => {
                        debug!(pattern = name, path = %candidate.display(), error = %e, "Failed to read pattern candidate");
                        continue;
                    }
                };

                match Pattern::from_yaml(name, &bytes) {
                    Ok(pattern) => {
                        span.set_attribute("source", source.kind());
                        let cached = CachedPath {
                            source: index,
                            relative: candidate.clone(),
                        };
                        return Ok(self.store(name, pattern, cached, generation));
                    }
                    Err(e) => {
                        warn!(pattern = name, path = %candidate.display(), error = %e, "Failed to parse pattern file");
                        parse_error.get_or_insert(e);
                    }
                }
            }
        }

        Err(parse_error.unwrap_or_else(|| PatternError::NotFound(name.to_string())))
    }

    fn read_at(&self, name: &str, cached: &CachedPath) -> Option<Pattern> {
        let source = self.sources.get(cached.source)?;
        let bytes = source.read(&cached.relative).ok()??;
        Pattern::from_yaml(name, &bytes).ok()
    }

    /// Cache a freshly read pattern
    ///
    /// `generation` is the cache generation observed before the read. If an
    /// eviction happened since, the bytes may predate it and are returned
    /// without being cached.
    fn store(
        &self,
        name: &str,
        pattern: Pattern,
        path: CachedPath,
        generation: u64,
    ) -> Arc<Pattern> {
        let pattern = Arc::new(pattern);
        let mut state = self.state.write();
        if state.generation != generation {
            debug!(pattern = name, "Cache changed during load, not caching it");
            return pattern;
        }
        state.patterns.insert(name.to_string(), Arc::clone(&pattern));
        state.paths.insert(name.to_string(), path);
        pattern
    }

    /// Relative paths probed for a name, in search order
    pub fn candidate_paths(&self, name: &str) -> Vec<PathBuf> {
        let search_paths = self.search_paths.read();
        let mut candidates = Vec::with_capacity((search_paths.len() + 1) * EXTENSIONS.len());
        for base in std::iter::once("").chain(search_paths.iter().map(String::as_str)) {
            for ext in EXTENSIONS {
                candidates.push(Path::new(base).join(format!("{}.{}", name, ext)));
            }
        }
        candidates
    }

    /// First existing filesystem file for a name
    pub fn locate_file(&self, name: &str) -> Result<Option<PathBuf>> {
        let Some(directory) = self.directory() else {
            return Ok(None);
        };
        for candidate in self.candidate_paths(name) {
            let path = directory.resolve(&candidate)?;
            if path.is_file() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Summaries of every loadable pattern across all sources
    ///
    /// The index is built once per cache generation. Files that fail to
    /// parse are skipped. When a name exists in several sources the
    /// higher-priority source wins.
    pub fn list_all(&self) -> Vec<PatternSummary> {
        let mut span = SpanGuard::new(self.tracer.as_ref(), "patterns.library.list_all");

        let generation = {
            let state = self.state.read();
            if let Some(index) = &state.index {
                span.set_attribute("cache", "hit");
                span.set_attribute("result.count", index.len());
                self.tracer
                    .record_metric("patterns.library.list_all", 1.0, &[("cache", "hit")]);
                return index.as_ref().clone();
            }
            state.generation
        };
        span.set_attribute("cache", "miss");

        let (summaries, skipped) = self.build_index();
        span.set_attribute("result.count", summaries.len());
        span.set_attribute("skipped.count", skipped);

        {
            let mut state = self.state.write();
            if state.generation == generation {
                state.index = Some(Arc::new(summaries.clone()));
            } else {
                debug!("Index invalidated during rebuild, not caching it");
            }
        }

        self.tracer
            .record_metric("patterns.library.list_all", 1.0, &[("cache", "miss")]);
        summaries
    }

    fn build_index(&self) -> (Vec<PatternSummary>, usize) {
        let mut seen = HashSet::new();
        let mut summaries = Vec::new();
        let mut skipped = 0;

        for (index, source) in self.sources.iter().enumerate() {
            for relative in source.list() {
                let Some(name) = pattern_name_from_path(&relative) else {
                    continue;
                };
                if seen.contains(&name) {
                    continue;
                }

                match self.load_indexed(&name, index, relative) {
                    Ok(pattern) => {
                        summaries.push(pattern.summary());
                        seen.insert(name);
                    }
                    Err(e) => {
                        skipped += 1;
                        debug!(pattern = %name, error = %e, "Skipping pattern while indexing");
                    }
                }
            }
        }

        debug!(
            patterns = summaries.len(),
            skipped, "Built pattern index"
        );
        (summaries, skipped)
    }

    fn load_indexed(&self, name: &str, source: usize, relative: PathBuf) -> Result<Arc<Pattern>> {
        let generation = {
            let state = self.state.read();
            if let Some(pattern) = state.patterns.get(name) {
                return Ok(Arc::clone(pattern));
            }
            state.generation
        };

        let cached = CachedPath { source, relative };
        let bytes = self.sources[source]
            .read(&cached.relative)?
            .ok_or_else(|| PatternError::NotFound(name.to_string()))?;
        let pattern = Pattern::from_yaml(name, &bytes)?;
        Ok(self.store(name, pattern, cached, generation))
    }

    /// Rank patterns against a free-text query
    ///
    /// An empty query returns the whole index, unranked.
    pub fn search(&self, query: &str) -> Vec<PatternSummary> {
        self.search_scored(query)
            .into_iter()
            .map(|hit| hit.summary)
            .collect()
    }

    /// Like [`Library::search`], keeping scores and match counts
    pub fn search_scored(&self, query: &str) -> Vec<SearchHit> {
        let mut span = SpanGuard::new(self.tracer.as_ref(), "patterns.library.search");
        span.set_attribute("query", query);

        let index = self.list_all();
        let hits = if query.trim().is_empty() {
            index
                .into_iter()
                .map(|summary| SearchHit {
                    summary,
                    score: 0.0,
                    matched: 0,
                })
                .collect()
        } else {
            search::rank(index, query)
        };

        span.set_attribute("result.count", hits.len());
        self.tracer
            .record_metric("patterns.library.search", 1.0, &[]);
        hits
    }

    pub fn filter_by_category(&self, category: &str) -> Vec<PatternSummary> {
        self.filter_by("category", category, |s| &s.category)
    }

    pub fn filter_by_backend_type(&self, backend_type: &str) -> Vec<PatternSummary> {
        self.filter_by("backend_type", backend_type, |s| &s.backend_type)
    }

    pub fn filter_by_difficulty(&self, difficulty: &str) -> Vec<PatternSummary> {
        self.filter_by("difficulty", difficulty, |s| &s.difficulty)
    }

    fn filter_by<F>(&self, field: &str, value: &str, get: F) -> Vec<PatternSummary>
    where
        F: Fn(&PatternSummary) -> &String,
    {
        let mut span = SpanGuard::new(self.tracer.as_ref(), "patterns.library.filter");
        span.set_attribute("filter.field", field);
        span.set_attribute("filter.value", value);

        let all = self.list_all();
        let result: Vec<PatternSummary> = if value.is_empty() {
            all
        } else {
            let wanted = value.to_lowercase();
            all.into_iter()
                .filter(|s| get(s).to_lowercase() == wanted)
                .collect()
        };

        span.set_attribute("result.count", result.len());
        self.tracer
            .record_metric("patterns.library.filter", 1.0, &[("field", field)]);
        result
    }

    /// Drop every cached pattern, path and the index
    pub fn clear_cache(&self) {
        let _span = SpanGuard::new(self.tracer.as_ref(), "patterns.library.clear_cache");
        {
            let mut state = self.state.write();
            state.patterns.clear();
            state.paths.clear();
            state.index = None;
            state.generation += 1;
        }
        self.tracer
            .record_metric("patterns.library.clear_cache", 1.0, &[]);
        info!("Pattern cache cleared");
    }

    /// Evict one pattern and mark the index stale
    ///
    /// Returns whether the pattern was cached.
    pub fn evict(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let existed = state.patterns.remove(name).is_some();
        state.paths.remove(name);
        state.index = None;
        state.generation += 1;
        existed
    }

    /// Put a previously validated pattern back into the cache
    pub(crate) fn restore(&self, name: &str, pattern: Arc<Pattern>) {
        let mut state = self.state.write();
        state.patterns.insert(name.to_string(), pattern);
        state.index = None;
        state.generation += 1;
    }

    /// Mark the index stale without evicting patterns
    pub fn invalidate_index(&self) {
        let mut state = self.state.write();
        state.index = None;
        state.generation += 1;
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.state.read().patterns.contains_key(name)
    }

    pub fn cached_count(&self) -> usize {
        self.state.read().patterns.len()
    }

    pub fn is_index_built(&self) -> bool {
        self.state.read().index.is_some()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("sources", &self.sources.len())
            .field("patterns_dir", &self.patterns_dir())
            .field("cached", &self.cached_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::RecordingTracer;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, body: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_load_from_search_path_populates_caches() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "analytics/sql_joins.yaml",
            "name: sql_joins\ncategory: analytics\ntemplate: SELECT 1\n",
        );

        let library = Library::with_directory(dir.path());
        assert!(!library.is_cached("sql_joins"));

        let first = library.load("sql_joins").unwrap();
        assert!(library.is_cached("sql_joins"));
        let second = library.load("sql_joins").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_path_cache_survives_eviction_of_pattern_only() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "ml/model.yml", "name: model\ncategory: ml\n");

        let tracer = Arc::new(RecordingTracer::new());
        let library = Library::with_directory(dir.path()).with_tracer(tracer.clone());
        library.load("model").unwrap();

        // Drop only the parsed pattern to force the path-cache route.
        library.state.write().patterns.clear();
        library.load("model").unwrap();

        let span = tracer.last_span("patterns.library.load").unwrap();
        assert_eq!(span.attribute("source"), Some("path_cache"));
    }

    #[test]
    fn test_embedded_takes_priority() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "p.yaml", "name: p\ncategory: filesystem\n");

        let embedded = EmbeddedSource::new().with_file("p.yaml", "name: p\ncategory: embedded\n");
        let library = Library::with_directory(dir.path()).with_embedded(embedded);

        assert_eq!(library.load("p").unwrap().category, "embedded");
        let all = library.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].category, "embedded");
    }

    #[test]
    fn test_parse_error_surfaces_when_nothing_else_matches() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "bad.yaml", "name: [unclosed");

        let library = Library::with_directory(dir.path());
        assert!(matches!(
            library.load("bad"),
            Err(PatternError::Parse { .. })
        ));
        assert!(matches!(
            library.load("missing"),
            Err(PatternError::NotFound(_))
        ));
        assert!(matches!(library.load(""), Err(PatternError::NotFound(_))));
    }

    #[test]
    fn test_path_escape_fails_closed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("patterns");
        fs::create_dir_all(&root).unwrap();
        write(dir.path(), "secret.yaml", "name: secret\ncategory: x\n");

        let library = Library::with_directory(&root);
        assert!(matches!(
            library.load("../secret"),
            Err(PatternError::PathEscape(_))
        ));
        assert!(!library.is_cached("../secret"));
    }

    #[test]
    fn test_generation_guards_index() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.yaml", "name: a\ncategory: x\n");

        let library = Library::with_directory(dir.path());
        assert!(!library.is_index_built());
        assert_eq!(library.list_all().len(), 1);
        assert!(library.is_index_built());

        library.invalidate_index();
        assert!(!library.is_index_built());
        assert!(library.is_cached("a"));

        assert!(library.evict("a"));
        assert!(!library.evict("a"));
    }

    #[test]
    fn test_add_search_path() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "custom/deep.yaml", "name: deep\ncategory: x\n");

        let library = Library::with_directory(dir.path()).with_search_paths(Vec::<String>::new());
        assert!(library.load("deep").is_err());

        library.add_search_path("custom");
        library.add_search_path("custom");
        assert_eq!(library.search_paths(), vec!["custom".to_string()]);
        assert_eq!(library.load("deep").unwrap().name, "deep");
        assert!(library
            .locate_file("deep")
            .unwrap()
            .unwrap()
            .ends_with("custom/deep.yaml"));
    }
}
