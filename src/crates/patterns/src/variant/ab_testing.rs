//! A/B testing over a pattern library
//!
//! Variants of a pattern live next to it as `<name>.<variant>` patterns
//! (for example `sql_joins.v2.yaml`). The base pattern is the `default`
//! variant.

use super::selector::{HashSelector, VariantSelector};
use crate::error::{PatternError, Result};
use crate::library::Library;
use crate::observability::SpanGuard;
use crate::pattern::Pattern;
use crate::tracking::{PatternMetadata, RequestContext};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Variant id of the base pattern
pub const DEFAULT_VARIANT: &str = "default";

/// Pattern chosen for a request
#[derive(Debug, Clone)]
pub struct VariantSelection {
    pub pattern: Arc<Pattern>,
    pub base_name: String,
    pub variant: String,
}

impl VariantSelection {
    /// Metadata to carry in the request context for usage reports
    pub fn metadata(&self, domain: impl Into<String>) -> PatternMetadata {
        PatternMetadata::new(self.base_name.clone(), self.variant.clone(), domain)
    }
}

/// Library wrapper that picks a pattern variant per request
pub struct AbTestingLibrary {
    library: Arc<Library>,
    selector: Arc<dyn VariantSelector>,
}

impl AbTestingLibrary {
    /// Wrap a library; sessions are assigned by [`HashSelector`] by default
    pub fn new(library: Arc<Library>) -> Self {
        Self {
            library,
            selector: Arc::new(HashSelector::new()),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn VariantSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// Variant ids of a pattern, `default` first
    ///
    /// Empty when the pattern has no suffixed variants.
    pub fn variants(&self, name: &str) -> Vec<String> {
        let prefix = format!("{}.", name);
        let suffixes: BTreeSet<String> = self
            .library
            .list_all()
            .into_iter()
            .filter_map(|summary| {
                summary
                    .name
                    .strip_prefix(&prefix)
                    .filter(|suffix| !suffix.is_empty())
                    .map(str::to_string)
            })
            .collect();

        if suffixes.is_empty() {
            return Vec::new();
        }

        std::iter::once(DEFAULT_VARIANT.to_string())
            .chain(suffixes.into_iter().filter(|s| s != DEFAULT_VARIANT))
            .collect()
    }

    /// Load a pattern for the session in `ctx`
    pub fn load(&self, name: &str, ctx: &RequestContext) -> Result<VariantSelection> {
        self.load_for_session(name, ctx.session_id())
    }

    /// Load a pattern, letting the selector pick the variant for a session
    pub fn load_for_session(&self, name: &str, session_id: &str) -> Result<VariantSelection> {
        let tracer = self.library.tracer();
        let mut span = SpanGuard::new(tracer.as_ref(), "patterns.abtest.load");
        span.set_attribute("pattern.name", name);

        let variants = self.variants(name);
        let variant = if variants.is_empty() {
            DEFAULT_VARIANT.to_string()
        } else {
            self.selector.select_variant(name, &variants, session_id)?
        };
        span.set_attribute("variant.selected", &variant);
        span.set_attribute("variant.count", variants.len());
        debug!(pattern = name, session_id, variant = %variant, "Selected pattern variant");

        let selection = self.load_with_variant(name, &variant)?;
        tracer.record_metric(
            "patterns.abtest.selection",
            1.0,
            &[("pattern", name), ("variant", selection.variant.as_str())],
        );
        Ok(selection)
    }

    /// Load a specific variant, bypassing selection
    ///
    /// Falls back to the base pattern when the variant does not exist.
    pub fn load_with_variant(&self, name: &str, variant: &str) -> Result<VariantSelection> {
        if variant.is_empty() || variant == DEFAULT_VARIANT {
            return self.load_base(name);
        }

        match self.library.load(&format!("{}.{}", name, variant)) {
            Ok(pattern) => Ok(VariantSelection {
                pattern,
                base_name: name.to_string(),
                variant: variant.to_string(),
            }),
            Err(PatternError::NotFound(_)) => {
                warn!(pattern = name, variant, "Variant not found, using base pattern");
                self.load_base(name)
            }
            Err(e) => Err(e),
        }
    }

    fn load_base(&self, name: &str) -> Result<VariantSelection> {
        Ok(VariantSelection {
            pattern: self.library.load(name)?,
            base_name: name.to_string(),
            variant: DEFAULT_VARIANT.to_string(),
        })
    }
}

impl std::fmt::Debug for AbTestingLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbTestingLibrary")
            .field("library", &self.library)
            .finish()
    }
}
