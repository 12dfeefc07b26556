//! Observability collaborator
//!
//! Every public library operation opens a named [`Span`], annotates it
//! (cache hit/miss, source, result counts) and emits a counter metric. The
//! core depends only on the [`Tracer`] trait; [`NoOpTracer`] is the default,
//! [`LogTracer`] forwards to `tracing`, and [`RecordingTracer`] keeps
//! everything in memory for inspection.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// A named unit of work with string attributes
#[derive(Debug, Clone)]
pub struct Span {
    name: String,
    attributes: BTreeMap<String, String>,
    errors: Vec<String>,
    start: Instant,
}

impl Span {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            errors: Vec::new(),
            start: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_attribute(&mut self, key: &str, value: impl ToString) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn add_error(&mut self, error: &dyn fmt::Display) {
        self.errors.push(error.to_string());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::new("")
    }
}

/// Tracing backend used by the library, reloader and orchestrator
pub trait Tracer: Send + Sync {
    /// Open a span
    fn start_span(&self, name: &str) -> Span {
        Span::new(name)
    }

    /// Close a span
    fn end_span(&self, span: Span);

    /// Emit a metric sample
    fn record_metric(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Attach an error to a span
    fn record_error(&self, span: &mut Span, error: &dyn std::error::Error) {
        span.add_error(&error);
    }
}

/// Tracer that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTracer;

impl Tracer for NoOpTracer {
    fn end_span(&self, _span: Span) {}

    fn record_metric(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

/// Tracer that forwards spans and metrics to `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn end_span(&self, span: Span) {
        let elapsed_ms = span.elapsed().as_secs_f64() * 1000.0;
        if span.errors().is_empty() {
            debug!(
                span = %span.name(),
                duration_ms = elapsed_ms,
                attributes = ?span.attributes(),
                "Span finished"
            );
        } else {
            warn!(
                span = %span.name(),
                duration_ms = elapsed_ms,
                attributes = ?span.attributes(),
                errors = ?span.errors(),
                "Span finished with errors"
            );
        }
    }

    fn record_metric(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        trace!(metric = name, value, labels = ?labels, "Metric recorded");
    }
}

/// A metric sample captured by [`RecordingTracer`]
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    pub labels: BTreeMap<String, String>,
}

/// Tracer that keeps finished spans and metrics in memory
#[derive(Debug, Default)]
pub struct RecordingTracer {
    spans: Mutex<Vec<Span>>,
    metrics: Mutex<Vec<MetricRecord>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished spans, oldest first
    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().clone()
    }

    /// Most recent finished span with this name
    pub fn last_span(&self, name: &str) -> Option<Span> {
        self.spans
            .lock()
            .iter()
            .rev()
            .find(|s| s.name() == name)
            .cloned()
    }

    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.metrics.lock().clone()
    }

    /// Number of samples recorded under a metric name
    pub fn metric_count(&self, name: &str) -> usize {
        self.metrics.lock().iter().filter(|m| m.name == name).count()
    }

    pub fn clear(&self) {
        self.spans.lock().clear();
        self.metrics.lock().clear();
    }
}

impl Tracer for RecordingTracer {
    fn end_span(&self, span: Span) {
        self.spans.lock().push(span);
    }

    fn record_metric(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.metrics.lock().push(MetricRecord {
            name: name.to_string(),
            value,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }
}

/// Span that is handed back to its tracer when dropped
///
/// A `duration_ms` attribute is set on drop so early returns still close
/// the span with timing.
pub struct SpanGuard<'a> {
    tracer: &'a dyn Tracer,
    span: Span,
}

impl<'a> SpanGuard<'a> {
    pub fn new(tracer: &'a dyn Tracer, name: &str) -> Self {
        Self {
            span: tracer.start_span(name),
            tracer,
        }
    }

    /// Attach an error through the tracer
    pub fn record_error(&mut self, error: &dyn std::error::Error) {
        self.tracer.record_error(&mut self.span, error);
    }
}

impl Deref for SpanGuard<'_> {
    type Target = Span;

    fn deref(&self) -> &Span {
        &self.span
    }
}

impl DerefMut for SpanGuard<'_> {
    fn deref_mut(&mut self) -> &mut Span {
        &mut self.span
    }
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        let mut span = std::mem::take(&mut self.span);
        let elapsed_ms = span.elapsed().as_secs_f64() * 1000.0;
        span.set_attribute("duration_ms", format!("{:.2}", elapsed_ms));
        self.tracer.end_span(span);
    }
}
