//! Diagnostic types.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// A diagnostic parsed from toolchain output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The file the diagnostic originates from, as printed by the toolchain.
    pub file: Utf8PathBuf,
    /// The toolchain-specific error/warning code (e.g. `PG001`).
    pub code: Option<String>,
    /// The message text, verbatim.
    pub message: String,
    /// The source range.
    pub range: Range,
    /// The severity level.
    pub severity: Severity,
}

impl Diagnostic {
    /// Creates a new diagnostic with an empty range and no code.
    pub fn new(file: impl Into<Utf8PathBuf>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            code: None,
            message: message.into(),
            range: Range::default(),
            severity,
        }
    }

    /// Sets the diagnostic code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the source range.
    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }
}

/// The severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// A warning that doesn't fail the build.
    Warning,
    /// An error reported by the toolchain.
    Error,
}

impl Severity {
    /// Maps a captured category token to a severity.
    ///
    /// Only the exact token `error` is an error; every other category is a warning.
    pub fn from_category(category: &str) -> Self {
        if category == "error" {
            Severity::Error
        } else {
            Severity::Warning
        }
    }

    /// Returns the lowercase category name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A 0-based position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

impl Position {
    /// Creates a new position.
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A 0-based source range. All-zero when the toolchain printed no location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    /// Start position (inclusive).
    pub start: Position,
    /// End position.
    pub end: Position,
}

impl Range {
    /// Creates a new range.
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Returns true if no location was attached.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
