//! Error handling for the CIR lowering pipeline
//!
//! Two tiers exist. Problems caused by the input (malformed IR text, IR that
//! breaks a dialect rule, constructs a pass cannot lower) are reported as
//! [`Diagnostic`]s and collected by a [`DiagnosticEngine`] so that a single run
//! surfaces as many of them as possible. Violations of the pipeline's own
//! invariants are not represented here: they panic at the point of detection.

use crate::source_loc::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type shared by every pipeline stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CirError {
    #[error("Parse error at {location}: {message}")]
    Parse {
        location: SourceLocation,
        message: String,
    },

    #[error("Verification failed at {location}: {message}")]
    Verification {
        location: SourceLocation,
        message: String,
    },

    #[error("Lowering error at {location}: {message}")]
    Lowering {
        location: SourceLocation,
        message: String,
    },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal compiler error: {message}")]
    Internal { message: String },
}

impl CirError {
    pub fn parse_error(message: impl Into<String>, location: SourceLocation) -> Self {
        CirError::Parse {
            location,
            message: message.into(),
        }
    }

    pub fn lowering_error(message: impl Into<String>, location: SourceLocation) -> Self {
        CirError::Lowering {
            location,
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        CirError::Config {
            message: message.into(),
        }
    }

    /// Location the error is anchored at, if it has one
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            CirError::Parse { location, .. }
            | CirError::Verification { location, .. }
            | CirError::Lowering { location, .. } => Some(location),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CirError {
    fn from(err: std::io::Error) -> Self {
        CirError::Io {
            message: err.to_string(),
        }
    }
}

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A diagnostic message with location and severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Error, message.into(), location)
    }

    pub fn warning(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Warning, message.into(), location)
    }

    pub fn note(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Note, message.into(), location)
    }

    fn new(severity: Severity, message: String, location: SourceLocation) -> Self {
        Self {
            severity,
            message,
            location,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        Ok(())
    }
}

impl From<&CirError> for Diagnostic {
    fn from(err: &CirError) -> Self {
        let location = err.location().cloned().unwrap_or_default();
        let message = match err {
            CirError::Parse { message, .. }
            | CirError::Verification { message, .. }
            | CirError::Lowering { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Diagnostic::error(message, location)
    }
}

/// Collects diagnostics emitted while processing one translation unit
#[derive(Debug, Clone, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic of any severity
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        self.diagnostics.push(diagnostic);
    }

    /// Report an error diagnostic
    pub fn error(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.emit(Diagnostic::error(message, location));
    }

    /// Report a warning diagnostic
    pub fn warning(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.emit(Diagnostic::warning(message, location));
    }

    /// Check if any errors have been reported
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Move every diagnostic out of `other` into this engine
    pub fn absorb(&mut self, other: DiagnosticEngine) {
        for diagnostic in other.diagnostics {
            self.emit(diagnostic);
        }
    }

    /// Print all diagnostics to stderr
    pub fn print_diagnostics(&self) {
        for diagnostic in &self.diagnostics {
            eprintln!("{}", diagnostic);
        }
    }

    /// Create a summary string
    pub fn summary(&self) -> String {
        match (self.error_count, self.warning_count) {
            (0, 0) => "No errors or warnings".to_string(),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => format!(
                "{} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}
