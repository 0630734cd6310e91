//! Toolchain output parser.
//!
//! Recognizes canonical MSBuild-style diagnostic lines:
//!
//! ```text
//! [N>]origin(line,col,endLine,endCol): [subcategory ]error|warning [CODE]: message
//! [N>]origin: [subcategory ]error|warning [CODE]: message
//! ```
//!
//! Matching runs in multi-line mode over a whole chunk, so a diagnostic is found
//! only when its line is fully contained in that chunk. The origin ends at the
//! first colon that is followed by a category, so messages may themselves
//! contain `error:` or `warning:`. Every call compiles no
//! state of its own: the patterns are shared and immutable, and results depend
//! only on the text passed in.

use crate::diagnostic::{Diagnostic, Position, Range, Severity};
use camino::Utf8PathBuf;
use regex::Regex;
use std::num::ParseIntError;
use std::sync::OnceLock;
use thiserror::Error;

const DIAGNOSTIC_PATTERN: &str = r"(?mR)^\s*(?:\d+>)?(?:(?P<origin>[^\s].*?):|)\s*(?P<subcategory>|[^:]*? )(?P<category>error|warning)(?:\s*(?P<code>[^: ]*))?\s*:\s*(?P<text>.*)$";

const LOCATION_PATTERN: &str = r"^(?P<origin>[^\s].*)\((?P<details>\d+|\d+-\d+|\d+,\d+(?:-\d+)?|\d+,\d+,\d+,\d+)\)$";

const MARKER_PATTERN: &str = r"###(?P<value>.*)###";

/// Errors for a single matched diagnostic line that could not be turned into a
/// [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line matched the diagnostic grammar but carried no origin file.
    #[error("diagnostic has no origin: {line}")]
    MissingOrigin { line: String },

    /// The location suffix held a number that does not fit a line/column.
    #[error("invalid location in `{origin}`: {source}")]
    InvalidLocation {
        origin: String,
        #[source]
        source: ParseIntError,
    },
}

/// The result of parsing one chunk of output.
#[derive(Debug, Default)]
pub struct ParsedOutput {
    /// Diagnostics in discovery order.
    pub diagnostics: Vec<Diagnostic>,
    /// Lines that matched the grammar but were rejected.
    pub errors: Vec<ParseError>,
}

impl ParsedOutput {
    /// Returns true if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty() && self.errors.is_empty()
    }
}

fn diagnostic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DIAGNOSTIC_PATTERN).expect("diagnostic pattern is valid"))
}

fn location_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LOCATION_PATTERN).expect("location pattern is valid"))
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MARKER_PATTERN).expect("marker pattern is valid"))
}

/// Parses a chunk of toolchain output into diagnostics.
///
/// Never fails as a whole: lines that match but cannot be converted are
/// collected in [`ParsedOutput::errors`].
pub fn parse_output(output: &str) -> ParsedOutput {
    let mut parsed = ParsedOutput::default();

    for caps in diagnostic_regex().captures_iter(output) {
        let Some(origin) = caps.name("origin").map(|m| m.as_str().trim()) else {
            parsed.errors.push(ParseError::MissingOrigin {
                line: caps[0].trim().to_string(),
            });
            continue;
        };

        let (file, range) = match parse_location(origin) {
            Ok(location) => location,
            Err(err) => {
                parsed.errors.push(err);
                continue;
            }
        };

        let code = caps
            .name("code")
            .map(|m| m.as_str())
            .filter(|code| !code.is_empty())
            .map(str::to_string);

        parsed.diagnostics.push(Diagnostic {
            file,
            code,
            message: caps["text"].to_string(),
            range,
            severity: Severity::from_category(&caps["category"]),
        });
    }

    parsed
}

/// Splits an origin such as `foo.sql(10,5)` into the file and its range.
///
/// Origins without a location suffix yield the whole origin as the file and an
/// all-zero range.
pub fn parse_location(origin: &str) -> Result<(Utf8PathBuf, Range), ParseError> {
    let Some(caps) = location_regex().captures(origin) else {
        return Ok((Utf8PathBuf::from(origin), Range::default()));
    };

    let range = range_from_details(&caps["details"]).map_err(|source| {
        ParseError::InvalidLocation {
            origin: origin.to_string(),
            source,
        }
    })?;

    Ok((Utf8PathBuf::from(&caps["origin"]), range))
}

/// Converts 1-based location details into a 0-based range.
///
/// A missing end line repeats the start line; a missing end column repeats the
/// start column for point locations and is 0 for line spans. The end of a
/// range is therefore never before its start, unlike a literal `0` default.
fn range_from_details(details: &str) -> Result<Range, ParseIntError> {
    let (head, tail) = match details.split_once('-') {
        Some((head, tail)) => (head, Some(tail)),
        None => (details, None),
    };

    let numbers = head
        .split(',')
        .map(|n| n.parse::<u32>().map(|n| n.saturating_sub(1)))
        .collect::<Result<Vec<_>, _>>()?;
    let tail = tail
        .map(|n| n.parse::<u32>().map(|n| n.saturating_sub(1)))
        .transpose()?;

    let range = match (numbers.as_slice(), tail) {
        ([line], None) => point(*line, 0),
        ([line], Some(end_line)) => Range::new(Position::new(*line, 0), Position::new(end_line, 0)),
        ([line, column], None) => point(*line, *column),
        ([line, column], Some(end_column)) => Range::new(
            Position::new(*line, *column),
            Position::new(*line, end_column),
        ),
        ([line, column, end_line, end_column], None) => Range::new(
            Position::new(*line, *column),
            Position::new(*end_line, *end_column),
        ),
        _ => Range::default(),
    };

    Ok(range)
}

fn point(line: u32, column: u32) -> Range {
    let position = Position::new(line, column);
    Range::new(position, position)
}

/// Extracts the first out-of-band `###value###` marker from a chunk.
pub fn extract_marker(output: &str) -> Option<&str> {
    marker_regex()
        .captures(output)
        .and_then(|caps| caps.name("value"))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    #[test]
    fn test_parse_located_error() {
        let parsed = parse_output("foo.sql(10,5): error PG001: bad syntax");
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.diagnostics.len(), 1);

        let diag = &parsed.diagnostics[0];
        assert_eq!(diag.file.as_str(), "foo.sql");
        assert_eq!(diag.code.as_deref(), Some("PG001"));
        assert_eq!(diag.message, "bad syntax");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.range.start, Position::new(9, 4));
    }

    #[test]
    fn test_parse_warning_without_location() {
        let parsed =
            parse_output("/work/db/db.pgproj : warning PG1002: Object [dbo].[t] is unresolved");
        let diag = &parsed.diagnostics[0];
        assert_eq!(diag.file.as_str(), "/work/db/db.pgproj");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.code.as_deref(), Some("PG1002"));
        assert_eq!(diag.message, "Object [dbo].[t] is unresolved");
        assert!(diag.range.is_empty());
    }

    #[test]
    fn test_parse_multiplex_prefix_and_subcategory() {
        let parsed = parse_output("  3>tables/users.sql(4,1): Build error PG42: duplicate column");
        let diag = &parsed.diagnostics[0];
        assert_eq!(diag.file.as_str(), "tables/users.sql");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("PG42"));
        assert_eq!(diag.message, "duplicate column");
    }

    #[test]
    fn test_parse_message_containing_category_keyword() {
        let parsed = parse_output("foo.sql(3,1): error PG001: Syntax error: unexpected end");
        assert!(parsed.errors.is_empty());

        let diag = &parsed.diagnostics[0];
        assert_eq!(diag.file.as_str(), "foo.sql");
        assert_eq!(diag.code.as_deref(), Some("PG001"));
        assert_eq!(diag.message, "Syntax error: unexpected end");
        assert_eq!(diag.range, range(2, 0, 2, 0));
    }

    #[test]
    fn test_parse_unlocated_message_containing_category_keyword() {
        let parsed = parse_output("db.pgproj : warning PG7: build warning: stale reference");
        let diag = &parsed.diagnostics[0];
        assert_eq!(diag.file.as_str(), "db.pgproj");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.code.as_deref(), Some("PG7"));
        assert_eq!(diag.message, "build warning: stale reference");
    }

    #[test]
    fn test_parse_windows_drive_origin() {
        let parsed = parse_output(r"C:\repo\db\foo.sql(5,2): error PG12: missing ; error: at end");
        let diag = &parsed.diagnostics[0];
        assert_eq!(diag.file.as_str(), r"C:\repo\db\foo.sql");
        assert_eq!(diag.code.as_deref(), Some("PG12"));
        assert_eq!(diag.message, "missing ; error: at end");
        assert_eq!(diag.range.start, Position::new(4, 1));
    }

    #[test]
    fn test_parse_without_code() {
        let parsed = parse_output("schema.sql(2): warning : trailing whitespace");
        let diag = &parsed.diagnostics[0];
        assert_eq!(diag.code, None);
        assert_eq!(diag.message, "trailing whitespace");
        assert_eq!(diag.range, range(1, 0, 1, 0));
    }

    #[test]
    fn test_parse_many_lines_with_noise() {
        let output = "Build started 1/1/2026.\r\n\
                      a.sql(1,1): error PG1: first\r\n\
                      Compiling...\r\n\
                      b.sql(2,2): warning PG2: second\r\n\
                      Build FAILED.\r\n";
        let parsed = parse_output(output);
        assert_eq!(parsed.diagnostics.len(), 2);
        assert_eq!(parsed.diagnostics[0].message, "first");
        assert_eq!(parsed.diagnostics[1].file.as_str(), "b.sql");
        assert_eq!(parsed.diagnostics[1].message, "second");
    }

    #[test]
    fn test_parse_is_stateless() {
        let output = "x.sql(3,3): error PG3: again";
        let first = parse_output(output);
        let second = parse_output(output);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(second.diagnostics.len(), 1);
    }

    #[test]
    fn test_parse_plain_output() {
        assert!(parse_output("").is_empty());
        assert!(parse_output("Build succeeded.\n    0 Warning(s)\n    0 Error(s)\n").is_empty());
    }

    #[test]
    fn test_partial_line_is_not_a_diagnostic() {
        assert!(parse_output("foo.sql(10,5): err").is_empty());
    }

    #[test]
    fn test_missing_origin_is_rejected() {
        let parsed = parse_output("error PG9: no file here");
        assert!(parsed.diagnostics.is_empty());
        assert!(matches!(parsed.errors[0], ParseError::MissingOrigin { .. }));
    }

    #[test]
    fn test_location_overflow_is_rejected() {
        let parsed = parse_output("a.sql(99999999999,1): error PG1: huge");
        assert!(parsed.diagnostics.is_empty());
        assert!(matches!(parsed.errors[0], ParseError::InvalidLocation { .. }));
    }

    #[test]
    fn test_location_forms() {
        let cases = [
            ("f.sql(10)", range(9, 0, 9, 0)),
            ("f.sql(10-12)", range(9, 0, 11, 0)),
            ("f.sql(10,5)", range(9, 4, 9, 4)),
            ("f.sql(10,5-8)", range(9, 4, 9, 7)),
            ("f.sql(10,5,11,2)", range(9, 4, 10, 1)),
            ("f.sql(0,0)", range(0, 0, 0, 0)),
        ];

        for (origin, expected) in cases {
            let (file, actual) = parse_location(origin).unwrap();
            assert_eq!(file.as_str(), "f.sql", "{origin}");
            assert_eq!(actual, expected, "{origin}");
        }
    }

    #[test]
    fn test_location_end_never_precedes_start() {
        for origin in ["f.sql(10)", "f.sql(10,5)", "f.sql(3-4)", "f.sql(2,7-9)"] {
            let (_, actual) = parse_location(origin).unwrap();
            assert!(actual.start <= actual.end, "{origin}: {actual:?}");
        }
    }

    #[test]
    fn test_location_unrecognized_suffix() {
        let (file, actual) = parse_location("f.sql(1,2,3)").unwrap();
        assert_eq!(file.as_str(), "f.sql(1,2,3)");
        assert!(actual.is_empty());
    }

    #[test]
    fn test_extract_marker() {
        assert_eq!(
            extract_marker("noise\n###/out/db.sql###\nmore"),
            Some("/out/db.sql")
        );
        assert_eq!(extract_marker("no marker here"), None);
    }
}
