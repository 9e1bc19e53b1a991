//! Soft failures that are reported but never abort a construction.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::tag::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    /// No binding rule claimed an attribute.
    UnhandledAttribute,
    /// A namespace was declared that no tag library supports.
    UnknownNamespace,
}

/// A named, timestamped diagnostic entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Name the entry is keyed by: the attribute name or the namespace prefix.
    pub name: String,
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
    pub timestamp: DateTime<Utc>,
}

impl Diagnostic {
    pub fn new(
        name: impl Into<String>,
        code: DiagnosticCode,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            code,
            severity,
            message: message.into(),
            location: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location} {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Receives diagnostics produced while binding and resolving tags.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// In-memory sink collecting reported diagnostics.
///
/// A bounded log keeps only the newest `capacity` entries.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<VecDeque<Diagnostic>>,
    capacity: Option<usize>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::new()), capacity: Some(capacity) }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn report(&self, diagnostic: Diagnostic) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return;
            }
            while entries.len() >= capacity {
                entries.pop_front();
            }
        }
        entries.push_back(diagnostic);
    }
}
