//! MSBuild-style diagnostics for pgproj-build.
//!
//! This crate turns free-form toolchain output into structured diagnostics:
//! - [`parse_output`] finds `origin(line,col): error CODE: message` lines in a chunk
//! - [`DiagnosticRegistry`] keeps them per file, deduplicated
//! - [`extract_marker`] pulls `###value###` side-channel markers out of a chunk
//!
//! # Example
//!
//! ```
//! use msbuild_diagnostics::{parse_output, DiagnosticRegistry, Severity};
//!
//! let parsed = parse_output("foo.sql(10,5): error PG001: bad syntax");
//! let mut registry = DiagnosticRegistry::new();
//! for diagnostic in parsed.diagnostics {
//!     assert_eq!(diagnostic.severity, Severity::Error);
//!     registry.insert(diagnostic);
//! }
//! assert_eq!(registry.len(), 1);
//! ```

mod diagnostic;
mod parser;
mod registry;

pub use diagnostic::{Diagnostic, Position, Range, Severity};
pub use parser::{extract_marker, parse_location, parse_output, ParseError, ParsedOutput};
pub use registry::{DedupKey, DiagnosticRegistry};
