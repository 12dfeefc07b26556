//! Hot reload of filesystem patterns
//!
//! A [`HotReloader`] watches the library's patterns directory and its search
//! subdirectories. Change events are debounced per file; only the last event
//! inside the window does any work. Changed files are parsed and validated
//! before the cache is touched: a valid file evicts the cached entry so the
//! next read picks it up lazily, an invalid one is rejected and reported
//! through the update callback.
//!
//! The reloader keeps the last validated copy of each pattern. When a
//! rejected update finds the cache entry already evicted, that copy is put
//! back so the pattern stays available.

use super::source::{is_pattern_file, normalize, pattern_name_from_path};
use super::Library;
use crate::error::{PatternError, Result};
use crate::observability::{SpanGuard, Tracer};
use crate::pattern::Pattern;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default debounce window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
/// Default time `stop` waits for the watch loop
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened to a pattern file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Create,
    Modify,
    Delete,
    ValidationFailed,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Create => "create",
            UpdateKind::Modify => "modify",
            UpdateKind::Delete => "delete",
            UpdateKind::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file change fed into the debounce pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Created,
    Modified,
    Removed,
}

/// Notification passed to the update callback
#[derive(Debug)]
pub struct PatternUpdate {
    pub kind: UpdateKind,
    pub pattern_name: String,
    pub file_path: PathBuf,
    pub error: Option<PatternError>,
}

/// Update callback, invoked synchronously from the reload task
pub type UpdateCallback = Arc<dyn Fn(&PatternUpdate) + Send + Sync>;

/// Hot reload settings
#[derive(Clone)]
pub struct HotReloadConfig {
    /// When false, `start` does nothing
    pub enabled: bool,
    pub debounce: Duration,
    pub stop_timeout: Duration,
    pub on_update: Option<UpdateCallback>,
}

impl HotReloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn on_update<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PatternUpdate) + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(callback));
        self
    }
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: DEFAULT_DEBOUNCE,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            on_update: None,
        }
    }
}

impl fmt::Debug for HotReloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotReloadConfig")
            .field("enabled", &self.enabled)
            .field("debounce", &self.debounce)
            .field("stop_timeout", &self.stop_timeout)
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

struct PendingReload {
    seq: u64,
    handle: JoinHandle<()>,
}

struct ReloaderCore {
    library: Arc<Library>,
    root: PathBuf,
    debounce: Duration,
    on_update: Option<UpdateCallback>,
    tracer: Arc<dyn Tracer>,
    pending: Mutex<HashMap<PathBuf, PendingReload>>,
    next_seq: AtomicU64,
    last_known_good: Mutex<HashMap<String, Arc<Pattern>>>,
}

struct Running {
    watcher: RecommendedWatcher,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    watched: Vec<PathBuf>,
}

enum Lifecycle {
    Idle,
    Running(Running),
    Stopped,
}

/// Filesystem watcher that keeps a [`Library`] consistent with disk
pub struct HotReloader {
    core: Arc<ReloaderCore>,
    enabled: bool,
    stop_timeout: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl HotReloader {
    /// Create a reloader for a library with a patterns directory
    pub fn new(library: Arc<Library>, config: HotReloadConfig) -> Result<Self> {
        let root = library.patterns_dir().ok_or_else(|| {
            PatternError::HotReload("library has no patterns directory to watch".to_string())
        })?;
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| normalize(root));
        let tracer = library.tracer();

        Ok(Self {
            core: Arc::new(ReloaderCore {
                library,
                root,
                debounce: config.debounce,
                on_update: config.on_update,
                tracer,
                pending: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                last_known_good: Mutex::new(HashMap::new()),
            }),
            enabled: config.enabled,
            stop_timeout: config.stop_timeout,
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    /// Watched root directory
    pub fn root(&self) -> &Path {
        &self.core.root
    }

    /// Attach watches and spawn the watch loop
    ///
    /// Must run inside a tokio runtime. Missing subdirectories are skipped.
    /// Calling `start` on a running reloader does nothing.
    pub fn start(&self) -> Result<()> {
        if !self.enabled {
            info!("Hot reload disabled, not watching patterns");
            return Ok(());
        }

        let mut lifecycle = self.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Running(_)) {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| {
            PatternError::HotReload("hot reload must be started inside a tokio runtime".to_string())
        })?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = event_tx.send(event);
        })
        .map_err(|e| PatternError::HotReload(format!("failed to create watcher: {}", e)))?;

        let root = self.core.root.clone();
        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|e| {
                PatternError::HotReload(format!("failed to watch {}: {}", root.display(), e))
            })?;

        let mut watched = vec![root.clone()];
        for subdir in self.core.library.search_paths() {
            let dir = root.join(&subdir);
            if !dir.is_dir() {
                debug!(directory = %dir.display(), "Skipping missing pattern directory");
                continue;
            }
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => watched.push(dir),
                Err(e) => warn!(directory = %dir.display(), error = %e, "Failed to watch pattern directory"),
            }
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let core = Arc::clone(&self.core);
        let task = runtime.spawn(core.run(event_rx, stop_rx));

        info!(
            root = %root.display(),
            directories = watched.len(),
            debounce_ms = self.core.debounce.as_millis() as u64,
            "Hot reload started"
        );

        *lifecycle = Lifecycle::Running(Running {
            watcher,
            stop_tx,
            task,
            watched,
        });
        Ok(())
    }

    /// Stop watching
    ///
    /// Idempotent. Waits up to the configured timeout for the watch loop to
    /// exit, then releases the OS watches and cancels pending reloads.
    pub async fn stop(&self) -> Result<()> {
        let running = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running(running) => running,
                other => {
                    *lifecycle = other;
                    return Ok(());
                }
            }
        };

        let Running {
            watcher,
            stop_tx,
            mut task,
            ..
        } = running;

        let _ = stop_tx.send(());
        if tokio::time::timeout(self.stop_timeout, &mut task)
            .await
            .is_err()
        {
            warn!(
                timeout_ms = self.stop_timeout.as_millis() as u64,
                "Hot reload watch loop did not stop in time"
            );
            task.abort();
        }

        self.core.cancel_pending();
        drop(watcher);
        info!("Hot reload stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    /// Directories with an active watch
    pub fn watched_directories(&self) -> Vec<PathBuf> {
        match &*self.lifecycle.lock() {
            Lifecycle::Running(running) => running.watched.clone(),
            _ => Vec::new(),
        }
    }

    /// Debounced reloads not yet fired
    pub fn pending_reloads(&self) -> usize {
        self.core.pending.lock().len()
    }

    /// Feed a change into the debounce pipeline
    ///
    /// Relative paths are taken relative to the watched root. Outside a
    /// tokio runtime the change is applied immediately.
    pub fn notify_change(&self, path: impl Into<PathBuf>, change: FileChange) {
        let path = path.into();
        let path = if path.is_relative() {
            self.core.root.join(path)
        } else {
            path
        };
        self.core.schedule(path, change);
    }

    /// Reload one pattern now, bypassing the watcher
    ///
    /// Probes the same directories as [`Library::load`], validates the file
    /// and evicts the cached entry on success.
    pub fn manual_reload(&self, name: &str) -> Result<()> {
        let mut span = SpanGuard::new(self.core.tracer.as_ref(), "patterns.hotreload.manual_reload");
        span.set_attribute("pattern.name", name);

        let result = self
            .core
            .library
            .locate_file(name)
            .and_then(|path| path.ok_or_else(|| PatternError::NotFound(name.to_string())))
            .and_then(|path| self.core.reload(name, &path));

        if let Err(e) = &result {
            span.record_error(e);
        }
        result
    }

    /// Last validated copy of a pattern
    pub fn last_known_good(&self, name: &str) -> Option<Arc<Pattern>> {
        self.core.last_known_good.lock().get(name).cloned()
    }
}

impl Drop for HotReloader {
    fn drop(&mut self) {
        if let Lifecycle::Running(running) =
            std::mem::replace(self.lifecycle.get_mut(), Lifecycle::Stopped)
        {
            let _ = running.stop_tx.send(());
            running.task.abort();
        }
        self.core.cancel_pending();
    }
}

impl fmt::Debug for HotReloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotReloader")
            .field("root", &self.core.root)
            .field("enabled", &self.enabled)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ReloaderCore {
    async fn run(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        mut stop: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut stop => break,
                event = events.recv() => match event {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => error!(error = %e, "File watcher error"),
                    None => break,
                },
            }
        }
        debug!("Hot reload watch loop exited");
    }

    fn handle_event(self: &Arc<Self>, event: Event) {
        let changes: Vec<(PathBuf, FileChange)> = match event.kind {
            EventKind::Create(_) => tag(event.paths, FileChange::Created),
            EventKind::Remove(_) => tag(event.paths, FileChange::Removed),
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => tag(event.paths, FileChange::Removed),
                RenameMode::To => tag(event.paths, FileChange::Created),
                RenameMode::Both => {
                    let mut paths = event.paths.into_iter();
                    paths
                        .next()
                        .map(|from| (from, FileChange::Removed))
                        .into_iter()
                        .chain(paths.map(|to| (to, FileChange::Created)))
                        .collect()
                }
                _ => event
                    .paths
                    .into_iter()
                    .map(|path| {
                        let change = if path.exists() {
                            FileChange::Modified
                        } else {
                            FileChange::Removed
                        };
                        (path, change)
                    })
                    .collect(),
            },
            EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(_) => tag(event.paths, FileChange::Modified),
            _ => Vec::new(),
        };

        for (path, change) in changes {
            self.schedule(path, change);
        }
    }

    fn schedule(self: &Arc<Self>, path: PathBuf, change: FileChange) {
        if !is_pattern_file(&path) {
            return;
        }
        if !normalize(&path).starts_with(&self.root) {
            debug!(path = %path.display(), "Ignoring change outside patterns root");
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            self.apply(&path, change);
            return;
        };

        let mut pending = self.pending.lock();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let core = Arc::clone(self);
        let key = path.clone();
        let delay = self.debounce;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            core.apply(&key, change);
            core.finish(&key, seq);
        });

        if let Some(previous) = pending.insert(path, PendingReload { seq, handle }) {
            previous.handle.abort();
        }
    }

    fn finish(&self, path: &Path, seq: u64) {
        let mut pending = self.pending.lock();
        if pending.get(path).is_some_and(|p| p.seq == seq) {
            pending.remove(path);
        }
    }

    fn cancel_pending(&self) {
        for (_, pending) in self.pending.lock().drain() {
            pending.handle.abort();
        }
    }

    fn apply(&self, path: &Path, change: FileChange) {
        let Some(name) = pattern_name_from_path(path) else {
            return;
        };
        match change {
            FileChange::Removed => self.handle_delete(&name, path),
            FileChange::Created => self.handle_upsert(&name, path, UpdateKind::Create),
            FileChange::Modified => self.handle_upsert(&name, path, UpdateKind::Modify),
        }
    }

    fn handle_upsert(&self, name: &str, path: &Path, kind: UpdateKind) {
        match self.reload(name, path) {
            Ok(()) => {
                info!(pattern = name, event = %kind, "Pattern reloaded");
                self.emit(PatternUpdate {
                    kind,
                    pattern_name: name.to_string(),
                    file_path: path.to_path_buf(),
                    error: None,
                });
            }
            Err(e) => {
                error!(pattern = name, path = %path.display(), error = %e, "Rejected pattern update");
                self.emit(PatternUpdate {
                    kind: UpdateKind::ValidationFailed,
                    pattern_name: name.to_string(),
                    file_path: path.to_path_buf(),
                    error: Some(e),
                });
            }
        }
    }

    fn handle_delete(&self, name: &str, path: &Path) {
        let was_cached = self.library.evict(name);
        self.last_known_good.lock().remove(name);
        self.tracer
            .record_metric("patterns.hotreload.delete", 1.0, &[]);
        info!(pattern = name, was_cached, "Pattern removed");

        self.emit(PatternUpdate {
            kind: UpdateKind::Delete,
            pattern_name: name.to_string(),
            file_path: path.to_path_buf(),
            error: None,
        });
    }

    /// Validate `path`, then evict on success or keep serving the last
    /// good copy on failure
    fn reload(&self, name: &str, path: &Path) -> Result<()> {
        match self.validate(name, path) {
            Ok(pattern) => {
                self.last_known_good
                    .lock()
                    .insert(name.to_string(), Arc::new(pattern));
                self.library.evict(name);
                Ok(())
            }
            Err(e) => {
                if !self.library.is_cached(name) {
                    let good = self.last_known_good.lock().get(name).cloned();
                    if let Some(good) = good {
                        self.library.restore(name, good);
                        info!(pattern = name, "Restored last known good pattern");
                    }
                }
                Err(e)
            }
        }
    }

    fn validate(&self, name: &str, path: &Path) -> Result<Pattern> {
        let mut span = SpanGuard::new(self.tracer.as_ref(), "patterns.hotreload.validate");
        span.set_attribute("pattern.name", name);
        span.set_attribute("pattern.file", path.display());

        let result = std::fs::read(path)
            .map_err(PatternError::from)
            .and_then(|bytes| Pattern::from_yaml(name, &bytes))
            .and_then(|pattern| {
                let report = pattern.validate()?;
                for warning in &report.warnings {
                    warn!(pattern = name, warning = %warning, "Pattern validation warning");
                }
                span.set_attribute("validation.has_warnings", report.has_warnings());
                Ok(pattern)
            });

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => {
                span.record_error(e);
                e.kind()
            }
        };
        span.set_attribute("validation.result", outcome);
        self.tracer
            .record_metric("patterns.hotreload.validate", 1.0, &[("result", outcome)]);
        result
    }

    fn emit(&self, update: PatternUpdate) {
        if let Some(callback) = &self.on_update {
            callback(&update);
        }
    }
}

fn tag(paths: Vec<PathBuf>, change: FileChange) -> Vec<(PathBuf, FileChange)> {
    paths.into_iter().map(|path| (path, change)).collect()
}
