//! Output formatting.

use crate::cli::OutputFormat;
use crate::coordinator::{BuildCounts, BuildResult};
use camino::Utf8Path;
use msbuild_diagnostics::{Diagnostic, Severity};
use serde::Serialize;

/// A formatted diagnostic for output.
#[derive(Debug, Serialize)]
pub struct FormattedDiagnostic {
    /// The diagnostic type (Error, Warning).
    #[serde(rename = "type")]
    pub diagnostic_type: String,
    /// The file path.
    pub filename: String,
    /// The start position.
    pub start: Position,
    /// The end position.
    pub end: Position,
    /// The message.
    pub message: String,
    /// The diagnostic code.
    pub code: Option<String>,
}

/// A position in the source.
#[derive(Debug, Serialize)]
pub struct Position {
    /// 1-indexed line number.
    pub line: u32,
    /// 1-indexed column number.
    pub column: u32,
}

impl From<msbuild_diagnostics::Position> for Position {
    fn from(pos: msbuild_diagnostics::Position) -> Self {
        Self {
            line: pos.line + 1,
            column: pos.column + 1,
        }
    }
}

/// The document printed for `--output json`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub results: &'a [BuildResult],
    pub diagnostics: Vec<FormattedDiagnostic>,
    pub summary: &'a RunSummary,
}

/// Formats diagnostics for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Renders the whole run: every file's problems followed by the summary,
    /// or a single [`JsonReport`] document for JSON output.
    pub fn render<'a, I>(&self, problems: I, results: &[BuildResult], summary: &RunSummary) -> String
    where
        I: IntoIterator<Item = (&'a Utf8Path, &'a [Diagnostic])>,
    {
        let format_file: fn(&[Diagnostic], &Utf8Path) -> String = match self.format {
            OutputFormat::Json => return Self::render_json(problems, results, summary),
            OutputFormat::Human => format_human,
            OutputFormat::Machine => format_machine,
        };

        let mut output: String = problems
            .into_iter()
            .map(|(file, diagnostics)| format_file(diagnostics, file))
            .collect();
        output.push_str(&summary.format());
        output.push('\n');
        output
    }

    fn render_json<'a, I>(problems: I, results: &[BuildResult], summary: &RunSummary) -> String
    where
        I: IntoIterator<Item = (&'a Utf8Path, &'a [Diagnostic])>,
    {
        let report = JsonReport {
            results,
            diagnostics: problems
                .into_iter()
                .flat_map(|(file, diagnostics)| Self::format_json_diagnostics(diagnostics, file))
                .collect(),
            summary,
        };
        let mut json = serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string());
        json.push('\n');
        json
    }

    /// Formats diagnostics into JSON-ready structs.
    pub fn format_json_diagnostics(
        diagnostics: &[Diagnostic],
        file_path: &Utf8Path,
    ) -> Vec<FormattedDiagnostic> {
        diagnostics
            .iter()
            .map(|diag| FormattedDiagnostic {
                diagnostic_type: match diag.severity {
                    Severity::Error => "Error".to_string(),
                    Severity::Warning => "Warning".to_string(),
                },
                filename: file_path.to_string(),
                start: diag.range.start.into(),
                end: diag.range.end.into(),
                message: diag.message.clone(),
                code: diag.code.clone(),
            })
            .collect()
    }
}

fn format_human(diagnostics: &[Diagnostic], file_path: &Utf8Path) -> String {
    let mut output = String::new();

    for diag in diagnostics {
        let severity = match diag.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };

        output.push_str(&format!(
            "{}:{}:{}\n{}: {}{}\n\n",
            file_path,
            diag.range.start.line + 1,
            diag.range.start.column + 1,
            severity,
            diag.message,
            code_suffix(diag)
        ));
    }

    output
}

fn format_machine(diagnostics: &[Diagnostic], file_path: &Utf8Path) -> String {
    let mut output = String::new();

    for diag in diagnostics {
        let severity = match diag.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        };

        output.push_str(&format!(
            "{} {}:{}:{}:{}:{} {}{}\n",
            severity,
            file_path,
            diag.range.start.line + 1,
            diag.range.start.column + 1,
            diag.range.end.line + 1,
            diag.range.end.column + 1,
            diag.message,
            code_suffix(diag)
        ));
    }

    output
}

fn code_suffix(diag: &Diagnostic) -> String {
    diag.code
        .as_deref()
        .map(|code| format!(" ({code})"))
        .unwrap_or_default()
}

/// Summary of a build run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Per-status project counts.
    pub projects: BuildCounts,
    /// Number of files with diagnostics.
    pub file_count: usize,
    /// Number of errors.
    pub error_count: usize,
    /// Number of warnings.
    pub warning_count: usize,
    /// Number of notices shown, such as an aborted session.
    pub notices: usize,
    /// Whether the run was interrupted.
    pub cancelled: bool,
}

impl RunSummary {
    /// Returns true if the run should exit with a failure status.
    pub fn is_failure(&self) -> bool {
        self.projects.failed > 0 || self.error_count > 0 || self.notices > 0 || self.cancelled
    }

    /// Formats the summary line.
    pub fn format(&self) -> String {
        let project_word = |n: usize| if n == 1 { "project" } else { "projects" };
        let error_word = if self.error_count == 1 {
            "error"
        } else {
            "errors"
        };
        let warning_word = if self.warning_count == 1 {
            "warning"
        } else {
            "warnings"
        };
        let file_word = if self.file_count == 1 {
            "file"
        } else {
            "files"
        };

        format!(
            "====================================\npgproj-build: {} {} succeeded, {} failed, {} skipped\nfound {} {} and {} {} in {} {}",
            self.projects.succeeded,
            project_word(self.projects.succeeded),
            self.projects.failed,
            self.projects.skipped,
            self.error_count,
            error_word,
            self.warning_count,
            warning_word,
            self.file_count,
            file_word
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::BuildStatus;
    use msbuild_diagnostics::Range;

    fn diag() -> Diagnostic {
        Diagnostic::new("foo.sql", Severity::Error, "bad syntax")
            .with_code("PG001")
            .with_range(Range::new(
                msbuild_diagnostics::Position::new(9, 4),
                msbuild_diagnostics::Position::new(9, 4),
            ))
    }

    fn file() -> &'static Utf8Path {
        Utf8Path::new("foo.sql")
    }

    #[test]
    fn test_format_human() {
        let diags = [diag()];
        let summary = RunSummary::default();
        let output = Formatter::new(OutputFormat::Human).render([(file(), &diags[..])], &[], &summary);
        assert!(output.starts_with("foo.sql:10:5\nError: bad syntax (PG001)\n\n===="));
        assert!(output.ends_with("in 0 files\n"));
    }

    #[test]
    fn test_format_machine_without_code() {
        let warning = [Diagnostic::new("bar.sql", Severity::Warning, "unused")];
        let output = Formatter::new(OutputFormat::Machine).render(
            [(Utf8Path::new("bar.sql"), &warning[..])],
            &[],
            &RunSummary::default(),
        );
        assert!(output.starts_with("WARNING bar.sql:1:1:1:1 unused\n===="));
    }

    #[test]
    fn test_format_json_report() {
        let diags = [diag()];
        let results = [BuildResult {
            project: "db.pgproj".into(),
            status: BuildStatus::Failure,
        }];
        let summary = RunSummary {
            projects: BuildCounts::from_results(&results),
            file_count: 1,
            error_count: 1,
            ..Default::default()
        };

        let output = Formatter::new(OutputFormat::Json).render([(file(), &diags[..])], &results, &summary);
        let report: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(report["results"][0]["project"], "db.pgproj");
        assert_eq!(report["results"][0]["status"], "failure");
        assert_eq!(report["diagnostics"][0]["filename"], "foo.sql");
        assert_eq!(report["diagnostics"][0]["code"], "PG001");
        assert_eq!(report["diagnostics"][0]["type"], "Error");
        assert_eq!(report["diagnostics"][0]["start"]["line"], 10);
        assert_eq!(report["summary"]["errorCount"], 1);
        assert_eq!(report["summary"]["projects"]["failed"], 1);
        assert!(!output.contains("===="));
    }

    #[test]
    fn test_summary() {
        let summary = RunSummary {
            projects: BuildCounts {
                succeeded: 1,
                failed: 2,
                skipped: 0,
            },
            file_count: 5,
            error_count: 2,
            warning_count: 3,
            ..Default::default()
        };

        let output = summary.format();
        assert!(output.contains("1 project succeeded, 2 failed, 0 skipped"));
        assert!(output.contains("2 errors"));
        assert!(output.contains("3 warnings"));
        assert!(output.contains("5 files"));
        assert!(summary.is_failure());
        assert!(!RunSummary::default().is_failure());
    }
}
