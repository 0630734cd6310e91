//! Main orchestration logic.

use crate::cli::Args;
use crate::config::BuildConfig;
use crate::coordinator::{BuildCoordinator, BuildCounts, BuildError, CoordinatorOptions};
use crate::host::{ConsoleHost, TranscriptTarget};
use crate::output::{Formatter, RunSummary};
use crate::validator::{is_project_file, SdkRange, SdkValidator};
use camino::{Utf8Path, Utf8PathBuf};
use dotnet_runner::{CancelToken, DotnetError, DotnetRunner};
use globset::{Glob, GlobSet, GlobSetBuilder};
use msbuild_diagnostics::Severity;
use thiserror::Error;
use walkdir::WalkDir;

/// Directories never searched for projects.
const DEFAULT_EXCLUDES: [&str; 3] = ["**/bin/**", "**/obj/**", "**/node_modules/**"];

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Invalid glob pattern.
    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// No dotnet executable could be located.
    #[error("the .NET SDK was not found; install it or pass --dotnet")]
    DotnetNotFound,

    /// dotnet error.
    #[error(transparent)]
    Dotnet(#[from] DotnetError),

    /// Build session error.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The output path query produced no value.
    #[error("no output file path reported for {0}")]
    OutputPathMissing(Utf8PathBuf),
}

/// Runs one build session over the selected projects.
pub async fn run(args: Args) -> Result<RunSummary, OrchestratorError> {
    let workspace = resolve_workspace(&args.workspace);

    let mut config = BuildConfig::load(&workspace);
    apply_overrides(&mut config, &args);

    let dotnet = match &args.dotnet {
        Some(path) => path.clone(),
        None => DotnetRunner::find_dotnet().ok_or(OrchestratorError::DotnetNotFound)?,
    };
    let runner = DotnetRunner::new(dotnet).with_working_dir(workspace.clone());
    if let Some(required) = &config.required_dotnet_sdk {
        let version = runner.require_sdk(required).await?;
        tracing::debug!(%version, "dotnet SDK accepted");
    }

    let target = if args.output.is_machine_readable() {
        TranscriptTarget::Stderr
    } else {
        TranscriptTarget::Stdout
    };
    let coordinator = BuildCoordinator::new(
        ConsoleHost::new(target),
        runner,
        SdkValidator,
        CoordinatorOptions {
            sdk_range: SdkRange::new(&config.min_supported_sdk, &config.max_supported_sdk),
            verbosity: config.verbosity.clone(),
            dedup: config.dedup,
        },
    );

    let token = CancelToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling build");
                token.cancel();
            }
        })
    };

    let result = match &args.output_path {
        Some(project) => print_output_path(&coordinator, project, &token).await,
        None => build(&coordinator, &args, &workspace, &config, &token).await,
    };
    ctrl_c.abort();

    let cancelled = token.is_cancelled();
    result.map(|mut summary| {
        summary.cancelled = cancelled;
        summary
    })
}

async fn print_output_path(
    coordinator: &BuildCoordinator<ConsoleHost, DotnetRunner, SdkValidator>,
    project: &Utf8Path,
    token: &CancelToken,
) -> Result<RunSummary, OrchestratorError> {
    match coordinator.output_file_path(project, Some(token)).await? {
        Some(path) => {
            println!("{}", path);
            Ok(RunSummary::default())
        }
        None => Err(OrchestratorError::OutputPathMissing(project.to_path_buf())),
    }
}

async fn build(
    coordinator: &BuildCoordinator<ConsoleHost, DotnetRunner, SdkValidator>,
    args: &Args,
    workspace: &Utf8Path,
    config: &BuildConfig,
    token: &CancelToken,
) -> Result<RunSummary, OrchestratorError> {
    let projects = if args.projects.is_empty() {
        discover_projects(workspace, &config.exclude)?
    } else {
        args.projects.clone()
    };

    if projects.is_empty() {
        eprintln!("No .pgproj projects found in {}", workspace);
        return Ok(RunSummary::default());
    }

    let results = coordinator.build_projects(&projects, Some(token)).await;

    let mut summary = RunSummary {
        projects: BuildCounts::from_results(&results),
        ..Default::default()
    };
    let formatter = Formatter::new(args.output);

    let output = coordinator.with_sink(|sink| {
        let host = sink.host();
        summary.notices = host.notice_count();

        for (_, diagnostics) in host.problems() {
            summary.file_count += 1;
            for diag in diagnostics {
                match diag.severity {
                    Severity::Error => summary.error_count += 1,
                    Severity::Warning => summary.warning_count += 1,
                }
            }
        }

        formatter.render(host.problems(), &results, &summary)
    });
    print!("{}", output);

    Ok(summary)
}

/// Finds every `.pgproj` under `workspace`, sorted.
pub fn discover_projects(
    workspace: &Utf8Path,
    exclude: &[String],
) -> Result<Vec<Utf8PathBuf>, OrchestratorError> {
    let exclude_set = build_exclude_set(exclude)?;

    let mut projects: Vec<Utf8PathBuf> = WalkDir::new(workspace)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| Utf8PathBuf::try_from(e.into_path()).ok())
        .filter(|p| is_project_file(p))
        .filter(|p| {
            let relative = p.strip_prefix(workspace).unwrap_or(p);
            !exclude_set.is_match(relative.as_str())
        })
        .collect();

    projects.sort();
    Ok(projects)
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet, OrchestratorError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| OrchestratorError::InvalidGlob(e.to_string()))?;
        builder.add(glob);
    }

    for pattern in DEFAULT_EXCLUDES {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }

    builder
        .build()
        .map_err(|e| OrchestratorError::InvalidGlob(e.to_string()))
}

fn resolve_workspace(workspace: &Utf8Path) -> Utf8PathBuf {
    if workspace.is_relative() {
        std::env::current_dir()
            .ok()
            .and_then(|p| Utf8PathBuf::try_from(p).ok())
            .unwrap_or_default()
            .join(workspace)
    } else {
        workspace.to_path_buf()
    }
}

fn apply_overrides(config: &mut BuildConfig, args: &Args) {
    if let Some(min) = &args.min_sdk {
        config.min_supported_sdk = min.clone();
    }
    if let Some(max) = &args.max_sdk {
        config.max_supported_sdk = max.clone();
    }
    if let Some(verbosity) = &args.verbosity {
        config.verbosity = verbosity.clone();
    }
    if let Some(dedup) = args.dedup {
        config.dedup = dedup.into();
    }
    config.exclude.extend(args.exclude.iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use msbuild_diagnostics::DedupKey;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn touch(root: &Utf8Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "<Project></Project>").unwrap();
    }

    #[test]
    fn test_relative_workspace() {
        let resolved = resolve_workspace(Utf8Path::new("db"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("db"));
        assert_eq!(resolve_workspace(Utf8Path::new("/srv/db")), "/srv/db");
    }

    #[test]
    fn test_discover_projects() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        touch(&root, "zeta/zeta.pgproj");
        touch(&root, "alpha/alpha.pgproj");
        touch(&root, "alpha/bin/Debug/copy.pgproj");
        touch(&root, "alpha/obj/stale.pgproj");
        touch(&root, "legacy/old.pgproj");
        touch(&root, "alpha/readme.md");

        let projects = discover_projects(&root, &["legacy/**".to_string()]).unwrap();
        let relative: Vec<_> = projects
            .iter()
            .map(|p| p.strip_prefix(&root).unwrap().as_str().replace('\\', "/"))
            .collect();
        assert_eq!(relative, vec!["alpha/alpha.pgproj", "zeta/zeta.pgproj"]);
    }

    #[test]
    fn test_invalid_exclude() {
        let err = discover_projects(Utf8Path::new("."), &["a/[".to_string()]).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidGlob(_)));
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "pgproj-build",
            "--max-sdk",
            "0.4.0",
            "--dedup",
            "location",
            "--exclude",
            "tmp/**",
        ]);
        let mut config = BuildConfig {
            exclude: vec!["legacy/**".to_string()],
            ..Default::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.min_supported_sdk, "0.1.0");
        assert_eq!(config.max_supported_sdk, "0.4.0");
        assert_eq!(config.dedup, DedupKey::Location);
        assert_eq!(config.exclude, vec!["legacy/**", "tmp/**"]);
    }
}
