//! Pattern knowledge library and intent routing
//!
//! This crate keeps a library of structured patterns (task templates,
//! examples and rules for a backend domain) cached in memory, keeps that
//! cache consistent with the on-disk source through a hot reloader, ranks
//! patterns against free-text requests, rolls out pattern variants for
//! A/B and canary experiments, and classifies requests into intents that
//! map onto execution plans.
//!
//! The main entry points are [`Library`], [`HotReloader`],
//! [`AbTestingLibrary`] and [`Orchestrator`].

pub mod config;
pub mod error;
pub mod library;
pub mod llm;
pub mod observability;
pub mod pattern;
pub mod router;
pub mod tracking;
pub mod variant;

pub use config::PatternsConfig;
pub use error::{PatternError, Result};
pub use library::{
    DirectorySource, EmbeddedSource, FileChange, HotReloadConfig, HotReloader, Library,
    PatternSource, PatternUpdate, SearchHit, SourceKind, UpdateKind,
};
pub use observability::{LogTracer, NoOpTracer, RecordingTracer, Span, SpanGuard, Tracer};
pub use pattern::{Pattern, PatternSummary, Template, ValidationReport};
pub use router::{
    Classification, ContextData, ExecutionPlan, ExecutionPlanner, IntentCategory,
    IntentClassifier, KeywordClassifier, LlmClassifierConfig, LlmIntentClassifier, Orchestrator,
    PatternRecommendation, PlannedStep, RoutingDecision, StaticPlanner,
};
pub use tracking::{
    EffectivenessTracker, InMemoryTracker, PatternMetadata, PatternUsage, RequestContext,
    UsageOutcome, UsageStats,
};
pub use variant::{AbTestingLibrary, VariantSelection, VariantSelector};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
