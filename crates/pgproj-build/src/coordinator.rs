//! Build sessions over one or many projects.
//!
//! A [`BuildCoordinator`] is the only way to start the toolchain for a build.
//! At most one session runs at a time; a second request made while a session
//! is in flight is rejected with a notice and produces no results.

use crate::host::Host;
use crate::runner::ProcessRunner;
use crate::sink::OutputSink;
use crate::validator::{unsupported_message, ProjectValidator, SdkRange, ValidationError};
use camino::{Utf8Path, Utf8PathBuf};
use dotnet_runner::{CancelToken, DotnetError, Toolchain};
use msbuild_diagnostics::DedupKey;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use thiserror::Error;

/// Notice shown when a session is requested while another one is running.
pub const BUILD_IN_PROGRESS_MESSAGE: &str =
    "There is a build already running, please cancel the build before starting a new one";

/// Coordinator errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Another session holds the coordinator.
    #[error("a build is already in progress")]
    AlreadyInProgress,

    /// Project validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The toolchain could not be run.
    #[error(transparent)]
    Toolchain(#[from] DotnetError),
}

/// Outcome of one project in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failure,
    Skipped,
}

/// One project's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub project: Utf8PathBuf,
    pub status: BuildStatus,
}

impl BuildResult {
    fn new(project: &Utf8Path, status: BuildStatus) -> Self {
        Self {
            project: project.to_path_buf(),
            status,
        }
    }
}

/// Per-status totals over a result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BuildCounts {
    /// Tallies a result list.
    pub fn from_results(results: &[BuildResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            match result.status {
                BuildStatus::Success => counts.succeeded += 1,
                BuildStatus::Failure => counts.failed += 1,
                BuildStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    /// Formats the transcript summary line.
    pub fn summary_line(&self) -> String {
        format!(
            "======== Build: {} succeeded or up-to-date, {} failed, {} skipped ========",
            self.succeeded, self.failed, self.skipped
        )
    }
}

/// Settings a coordinator is built with.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub sdk_range: SdkRange,
    pub verbosity: String,
    pub dedup: DedupKey,
}

/// Clears the in-progress flag however the session ends.
struct SessionGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> SessionGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self { flag })
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Serializes build sessions against a single toolchain.
///
/// The coordinator is single-threaded: it is shared by reference within one
/// task, and its sink is only borrowed between suspension points.
pub struct BuildCoordinator<H, T, V> {
    sink: RefCell<OutputSink<H>>,
    runner: ProcessRunner<T>,
    validator: V,
    sdk_range: SdkRange,
    verbosity: String,
    in_progress: Cell<bool>,
}

impl<H, T, V> BuildCoordinator<H, T, V>
where
    H: Host,
    T: Toolchain,
    V: ProjectValidator,
{
    /// Creates a coordinator reporting into `host`.
    pub fn new(host: H, toolchain: T, validator: V, options: CoordinatorOptions) -> Self {
        Self {
            sink: RefCell::new(OutputSink::new(host, options.dedup)),
            runner: ProcessRunner::new(toolchain),
            validator,
            sdk_range: options.sdk_range,
            verbosity: options.verbosity,
            in_progress: Cell::new(false),
        }
    }

    /// Returns true while a session is running.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.get()
    }

    /// Returns the toolchain builds are run with.
    pub fn toolchain(&self) -> &T {
        self.runner.toolchain()
    }

    /// Runs `f` against the output sink.
    pub fn with_sink<R>(&self, f: impl FnOnce(&OutputSink<H>) -> R) -> R {
        f(&self.sink.borrow())
    }

    /// Consumes the coordinator, returning its sink.
    pub fn into_sink(self) -> OutputSink<H> {
        self.sink.into_inner()
    }

    /// Builds `projects` in order and returns one result per attempted project.
    ///
    /// Out-of-range projects are reported as [`BuildStatus::Skipped`] and never
    /// reach the toolchain. Cancellation stops the loop before the next project
    /// and returns the results gathered so far. Errors from validation end the
    /// session with a single notice.
    pub async fn build_projects(
        &self,
        projects: &[Utf8PathBuf],
        cancel: Option<&CancelToken>,
    ) -> Vec<BuildResult> {
        let Some(_guard) = SessionGuard::acquire(&self.in_progress) else {
            self.notify(BUILD_IN_PROGRESS_MESSAGE);
            return Vec::new();
        };

        tracing::info!(projects = projects.len(), "build session started");
        {
            let mut sink = self.sink.borrow_mut();
            sink.clear();
            sink.show();
        }

        let mut results = Vec::new();
        if let Err(e) = self.run_session(projects, cancel, &mut results).await {
            tracing::warn!("build session aborted: {e}");
            self.notify(&e.to_string());
        }

        tracing::info!(results = results.len(), "build session finished");
        results
    }

    /// Asks the toolchain for a project's output file path.
    ///
    /// The value comes from the last `###value###` marker in the output. The
    /// transcript and problem list of the previous session are left untouched.
    pub async fn output_file_path(
        &self,
        project: &Utf8Path,
        cancel: Option<&CancelToken>,
    ) -> Result<Option<String>, BuildError> {
        let Some(_guard) = SessionGuard::acquire(&self.in_progress) else {
            self.notify(BUILD_IN_PROGRESS_MESSAGE);
            return Err(BuildError::AlreadyInProgress);
        };

        let args = vec![
            "build".to_string(),
            project.to_string(),
            "-t:GetOutputFilePath".to_string(),
        ];
        Ok(self.runner.query_marker(&args, cancel).await?)
    }

    async fn run_session(
        &self,
        projects: &[Utf8PathBuf],
        cancel: Option<&CancelToken>,
        results: &mut Vec<BuildResult>,
    ) -> Result<(), BuildError> {
        let unsupported = self
            .validator
            .check_project_version(&self.sdk_range, projects)
            .await?;

        {
            let mut sink = self.sink.borrow_mut();
            for project in &unsupported {
                tracing::info!(project = %project.path, sdk = %project.sdk_version, "skipping project");
                sink.append(&unsupported_message(project, &self.sdk_range));
                results.push(BuildResult::new(&project.path, BuildStatus::Skipped));
            }
        }

        for project in projects {
            if unsupported.iter().any(|u| &u.path == project) {
                continue;
            }
            if cancel.is_some_and(CancelToken::is_cancelled) {
                tracing::info!("build cancelled before {project}");
                break;
            }

            match self.build_one(project, cancel).await {
                Ok(()) => results.push(BuildResult::new(project, BuildStatus::Success)),
                Err(DotnetError::Cancelled) => break,
                Err(e) => {
                    tracing::debug!(%project, "build failed: {e}");
                    results.push(BuildResult::new(project, BuildStatus::Failure));
                }
            }
        }

        let counts = BuildCounts::from_results(results);
        self.sink.borrow_mut().append(&counts.summary_line());
        Ok(())
    }

    async fn build_one(
        &self,
        project: &Utf8Path,
        cancel: Option<&CancelToken>,
    ) -> Result<(), DotnetError> {
        let name = project.file_stem().unwrap_or(project.as_str());
        self.sink
            .borrow_mut()
            .append(&format!("------ Build started: Project: {name} ------"));

        let args = vec![
            "build".to_string(),
            project.to_string(),
            "-v".to_string(),
            self.verbosity.clone(),
        ];
        let result = self.runner.run(&args, &self.sink, cancel).await;

        let end = match &result {
            Ok(()) => format!("------ Build succeeded: Project: {name} ------"),
            Err(DotnetError::Cancelled) => format!("------ Build cancelled: Project: {name} ------"),
            Err(e) => format!("------ Build failed: Project: {name}: {e} ------"),
        };
        self.sink.borrow_mut().append(&end);

        result
    }

    fn notify(&self, message: &str) {
        self.sink.borrow_mut().host_mut().show_notice(message);
    }
}
