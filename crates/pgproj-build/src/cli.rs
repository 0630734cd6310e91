//! CLI argument parsing.

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use msbuild_diagnostics::DedupKey;

/// Build PostgreSQL database projects with the .NET toolchain.
#[derive(Debug, Parser)]
#[command(name = "pgproj-build")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Projects to build (defaults to every .pgproj under the workspace)
    pub projects: Vec<Utf8PathBuf>,

    /// Working directory for the build
    #[arg(long, default_value = ".")]
    pub workspace: Utf8PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Lowest supported project SDK version
    #[arg(long = "min-sdk")]
    pub min_sdk: Option<String>,

    /// Highest supported project SDK version
    #[arg(long = "max-sdk")]
    pub max_sdk: Option<String>,

    /// Path to the dotnet executable
    #[arg(long)]
    pub dotnet: Option<Utf8PathBuf>,

    /// MSBuild verbosity (q, m, n, d, diag)
    #[arg(long, short = 'v')]
    pub verbosity: Option<String>,

    /// Glob patterns to exclude from project discovery
    #[arg(long)]
    pub exclude: Vec<String>,

    /// How duplicate diagnostics are detected
    #[arg(long, value_enum)]
    pub dedup: Option<DedupMode>,

    /// Print the output file path of a project instead of building
    #[arg(long = "output-path", value_name = "PROJECT")]
    pub output_path: Option<Utf8PathBuf>,

    /// Show the dotnet version and installation path
    #[arg(long = "dotnet-version")]
    pub dotnet_version: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output
    Json,
    /// Machine-readable (one line per diagnostic)
    Machine,
}

impl OutputFormat {
    /// Returns true for formats meant to be consumed by other programs.
    pub fn is_machine_readable(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Machine)
    }
}

/// Deduplication options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DedupMode {
    /// One diagnostic per message text in a file
    Message,
    /// One diagnostic per identical record
    Location,
}

impl From<DedupMode> for DedupKey {
    fn from(mode: DedupMode) -> Self {
        match mode {
            DedupMode::Message => DedupKey::Message,
            DedupMode::Location => DedupKey::Location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["pgproj-build"]);
        assert_eq!(args.workspace.as_str(), ".");
        assert!(matches!(args.output, OutputFormat::Human));
        assert!(args.projects.is_empty());
        assert!(args.dedup.is_none());
        assert!(!args.dotnet_version);
    }

    #[test]
    fn test_projects_and_overrides() {
        let args = Args::parse_from([
            "pgproj-build",
            "db/a.pgproj",
            "db/b.pgproj",
            "--min-sdk",
            "0.1.0",
            "--max-sdk",
            "0.2.0",
            "-v",
            "minimal",
            "--exclude",
            "legacy/**",
            "--dedup",
            "location",
        ]);
        assert_eq!(args.projects.len(), 2);
        assert_eq!(args.min_sdk.as_deref(), Some("0.1.0"));
        assert_eq!(args.max_sdk.as_deref(), Some("0.2.0"));
        assert_eq!(args.verbosity.as_deref(), Some("minimal"));
        assert_eq!(args.exclude, vec!["legacy/**"]);
        assert_eq!(args.dedup.map(DedupKey::from), Some(DedupKey::Location));
    }

    #[test]
    fn test_output_formats() {
        let args = Args::parse_from(["pgproj-build", "--output", "json"]);
        assert!(matches!(args.output, OutputFormat::Json));
        assert!(args.output.is_machine_readable());

        let args = Args::parse_from(["pgproj-build", "--output", "machine"]);
        assert!(matches!(args.output, OutputFormat::Machine));
        assert!(!OutputFormat::Human.is_machine_readable());
    }

    #[test]
    fn test_output_path() {
        let args = Args::parse_from(["pgproj-build", "--output-path", "db/db.pgproj"]);
        assert_eq!(args.output_path.as_deref().map(|p| p.as_str()), Some("db/db.pgproj"));
    }
}
