use crate::identity::FileIdentity;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

pub const DIAGNOSTIC_SOURCE: &str = "terraform-indexer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

/// Zero-based line/character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// The first line of a file. Used when an error carries no usable location.
    pub const fn file_start() -> Self {
        Self {
            start: Position {
                line: 0,
                character: 0,
            },
            end: Position {
                line: 0,
                character: 300,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Severity,
    pub message: String,
    pub source: String,
}

impl Diagnostic {
    pub fn error(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            severity: Severity::Error,
            message: message.into(),
            source: DIAGNOSTIC_SOURCE.to_string(),
        }
    }
}

/// User-visible diagnostics surface.
pub trait DiagnosticSink: Send + Sync {
    /// Replace the diagnostics shown for `id`.
    fn publish(&self, id: &FileIdentity, diagnostics: Vec<Diagnostic>);

    fn clear(&self, id: &FileIdentity);
}

/// In-memory diagnostic collection, keyed by file.
#[derive(Debug, Default)]
pub struct DiagnosticCollection {
    entries: Mutex<HashMap<FileIdentity, Vec<Diagnostic>>>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &FileIdentity) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of files with at least one diagnostic.
    pub fn file_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every diagnostic, sorted by file.
    pub fn snapshot(&self) -> Vec<(FileIdentity, Vec<Diagnostic>)> {
        let mut all: Vec<_> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, diagnostics)| (id.clone(), diagnostics.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

impl DiagnosticSink for DiagnosticCollection {
    fn publish(&self, id: &FileIdentity, diagnostics: Vec<Diagnostic>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if diagnostics.is_empty() {
            entries.remove(id);
        } else {
            entries.insert(id.clone(), diagnostics);
        }
    }

    fn clear(&self, id: &FileIdentity) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}
