//! Invocation-scoped diagnostics.
//!
//! Pipeline components never reach for a global logger directly. They are
//! handed a [`DiagnosticSink`] and report what they found through it; the
//! binary wires a [`TracingSink`], tests wire a [`CollectingSink`] and assert
//! on what was emitted.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Validate,
    Normalize,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Validate => "validate",
            Stage::Normalize => "normalize",
            Stage::Load => "load",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single finding emitted by a pipeline component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    /// Object key of the document being processed, when known
    pub source: Option<String>,
    /// Index of the offending track within `tracks`
    pub track_index: Option<usize>,
    /// Fields that were missing or failed to parse
    pub fields: Vec<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            stage,
            severity,
            source: None,
            track_index: None,
            fields: Vec::new(),
            message: message.into(),
        }
    }

    pub fn info(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Info, message)
    }

    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Warning, message)
    }

    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Error, message)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_track_index(mut self, index: usize) -> Self {
        self.track_index = Some(index);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Destination for diagnostics emitted during one pipeline invocation.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

pub type SharedSink = Arc<dyn DiagnosticSink>;

/// Forwards diagnostics to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn shared() -> SharedSink {
        Arc::new(TracingSink)
    }
}

impl DiagnosticSink for TracingSink {
    fn emit(&self, d: Diagnostic) {
        let source = d.source.as_deref().unwrap_or("-");
        let fields = d.fields.join(",");
        match d.severity {
            Severity::Info => info!(
                stage = %d.stage,
                source,
                track_index = ?d.track_index,
                fields = %fields,
                "{}",
                d.message
            ),
            Severity::Warning => warn!(
                stage = %d.stage,
                source,
                track_index = ?d.track_index,
                fields = %fields,
                "{}",
                d.message
            ),
            Severity::Error => error!(
                stage = %d.stage,
                source,
                track_index = ?d.track_index,
                fields = %fields,
                "{}",
                d.message
            ),
        }
    }
}

/// Keeps every diagnostic in memory, optionally forwarding to `tracing` as well.
#[derive(Debug, Default)]
pub struct CollectingSink {
    collected: Mutex<Vec<Diagnostic>>,
    forward: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect and also forward to `tracing`.
    pub fn forwarding() -> Self {
        Self {
            collected: Mutex::new(Vec::new()),
            forward: true,
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self.collected.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn for_stage(&self, stage: Stage) -> Vec<Diagnostic> {
        self.diagnostics()
            .into_iter()
            .filter(|d| d.stage == stage)
            .collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        if self.forward {
            TracingSink.emit(diagnostic.clone());
        }
        match self.collected.lock() {
            Ok(mut guard) => guard.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}
