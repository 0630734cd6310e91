//! pgproj-build: build PostgreSQL database projects with the .NET toolchain.
//!
//! A [`BuildCoordinator`] runs one build session at a time. Each project is
//! validated against the supported SDK range, then built by a single `dotnet`
//! process whose output streams into an [`OutputSink`]. The sink keeps the
//! transcript, turns MSBuild diagnostics into per-file problem lists, and
//! mirrors both onto a [`Host`].
//!
//! ```ignore
//! use pgproj_build::{BuildCoordinator, ConsoleHost, CoordinatorOptions, SdkRange, SdkValidator, TranscriptTarget};
//! use dotnet_runner::{CancelToken, DotnetRunner};
//! use msbuild_diagnostics::DedupKey;
//!
//! let coordinator = BuildCoordinator::new(
//!     ConsoleHost::new(TranscriptTarget::Stdout),
//!     DotnetRunner::new("dotnet".into()),
//!     SdkValidator,
//!     CoordinatorOptions {
//!         sdk_range: SdkRange::new("0.1.0", "0.1.0"),
//!         verbosity: "n".to_string(),
//!         dedup: DedupKey::Message,
//!     },
//! );
//! let results = coordinator.build_projects(&["db/db.pgproj".into()], Some(&CancelToken::new())).await;
//! ```

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod host;
pub mod orchestrator;
pub mod output;
pub mod runner;
pub mod sink;
pub mod validator;

pub use coordinator::{
    BuildCoordinator, BuildCounts, BuildError, BuildResult, BuildStatus, CoordinatorOptions,
    BUILD_IN_PROGRESS_MESSAGE,
};
pub use host::{ConsoleHost, Host, MemoryHost, TranscriptTarget};
pub use runner::{ProcessRunner, BUILD_CANCELLED_MESSAGE};
pub use sink::{OutputSink, PARSE_FAILED_EVENT};
pub use validator::{
    ProjectValidator, SdkRange, SdkReference, SdkValidator, UnsupportedProject, ValidationError,
};
