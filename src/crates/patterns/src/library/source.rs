//! Pattern sources
//!
//! A source maps relative paths (`analytics/sql_joins.yaml`) to YAML bytes.
//! The library consults its sources in a fixed priority order: bundled
//! resources first, then the filesystem tree.

use crate::error::{PatternError, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Kind of backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Embedded,
    Filesystem,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Embedded => "embedded",
            SourceKind::Filesystem => "filesystem",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backing store of pattern files
pub trait PatternSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Read the file at `relative`; `Ok(None)` when it does not exist
    fn read(&self, relative: &Path) -> Result<Option<Vec<u8>>>;

    /// Relative paths of every pattern file in the store
    fn list(&self) -> Vec<PathBuf>;
}

/// Patterns bundled with the binary, keyed by relative path
///
/// ```
/// use patterns::EmbeddedSource;
///
/// let source = EmbeddedSource::new()
///     .with_file("analytics/sql_joins.yaml", "name: sql_joins\ncategory: analytics\n");
/// assert_eq!(source.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSource {
    files: BTreeMap<PathBuf, Cow<'static, str>>,
}

impl EmbeddedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(
        mut self,
        path: impl AsRef<Path>,
        content: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, content: impl Into<Cow<'static, str>>) {
        self.files
            .insert(normalize(path.as_ref()), content.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl PatternSource for EmbeddedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Embedded
    }

    fn read(&self, relative: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self
            .files
            .get(&normalize(relative))
            .map(|content| content.as_bytes().to_vec()))
    }

    fn list(&self) -> Vec<PathBuf> {
        self.files
            .keys()
            .filter(|path| is_pattern_file(path))
            .cloned()
            .collect()
    }
}

/// Patterns stored under a directory tree
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Create a source rooted at `root`
    ///
    /// Relative roots are anchored to the current directory so that `.` and
    /// `foo/..` still confine lookups.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            normalize(&root)
        } else {
            std::env::current_dir()
                .map(|cwd| normalize(&cwd.join(&root)))
                .unwrap_or(root)
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path under the root
    ///
    /// Fails closed with [`PatternError::PathEscape`] when the root is not
    /// absolute, when the lexically normalized path lies outside the root, or
    /// when an existing file's real path cannot be confirmed under the real
    /// root.
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf> {
        let escape = || PatternError::PathEscape(relative.display().to_string());

        let root = normalize(&self.root);
        if !root.is_absolute() {
            return Err(escape());
        }
        let resolved = normalize(&root.join(relative));
        if !resolved.starts_with(&root) {
            return Err(escape());
        }

        // A missing file has nothing to follow, so the lexical check suffices.
        let Ok(real) = fs::canonicalize(&resolved) else {
            return Ok(resolved);
        };
        match fs::canonicalize(&root) {
            Ok(real_root) if real.starts_with(&real_root) => Ok(resolved),
            _ => Err(escape()),
        }
    }

    /// Whether an absolute or root-relative path lies under the root
    pub fn contains(&self, path: &Path) -> bool {
        normalize(path).starts_with(normalize(&self.root))
    }
}

impl PatternSource for DirectorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Filesystem
    }

    fn read(&self, relative: &Path) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(relative)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Vec<PathBuf> {
        if !self.root.is_dir() {
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_pattern_file(entry.path()))
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect();
        files.sort();
        files
    }
}

/// Whether a path names a pattern file
///
/// Only `.yaml`/`.yml` qualify. Editor artifacts (names containing `.tmp`
/// or `~`, or starting with a dot) never do.
pub fn is_pattern_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if file_name.starts_with('.') || file_name.contains(".tmp") || file_name.contains('~') {
        return false;
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Pattern name for a file: its stem (`sql_joins.v2.yaml` -> `sql_joins.v2`)
pub fn pattern_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

/// Lexically normalize a path, resolving `.` and `..` without touching the
/// filesystem
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
