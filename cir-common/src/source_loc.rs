//! Source location tracking for diagnostics
//!
//! Every operation in the IR carries a location tag pointing back at the
//! source construct it was generated from. The textual IR parser also uses
//! these types to report where in a `.cir` file a syntax error occurred.

use serde::{Deserialize, Serialize};
use std::fmt;

const UNKNOWN_FILE: &str = "<unknown>";

/// A location in a source file (line and column are 1-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Create a location with filename
    pub fn new(filename: &str, line: u32, column: u32) -> Self {
        Self {
            filename: filename.to_string(),
            line,
            column,
        }
    }

    /// Location used for synthesized operations with no source counterpart
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_FILE, 0, 0)
    }

    pub fn is_unknown(&self) -> bool {
        self.filename == UNKNOWN_FILE && self.line == 0 && self.column == 0
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// Helper for creating source locations while scanning text
#[derive(Debug, Clone)]
pub struct SourceTracker {
    filename: String,
    line: u32,
    column: u32,
}

impl SourceTracker {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            line: 1,
            column: 1,
        }
    }

    /// Get current location
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(&self.filename, self.line, self.column)
    }

    /// Advance by one character
    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}
