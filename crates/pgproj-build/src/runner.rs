//! Runs one toolchain command, streaming into the output sink.

use crate::host::Host;
use crate::sink::OutputSink;
use dotnet_runner::{drive, CancelToken, DotnetError, Toolchain};
use msbuild_diagnostics::extract_marker;
use std::cell::RefCell;

/// Transcript line written when a run is cancelled.
pub const BUILD_CANCELLED_MESSAGE: &str = "Build has been cancelled";

/// Runs exactly one external command to completion or cancellation.
#[derive(Debug)]
pub struct ProcessRunner<T> {
    toolchain: T,
}

impl<T: Toolchain> ProcessRunner<T> {
    /// Creates a runner over a toolchain.
    pub fn new(toolchain: T) -> Self {
        Self { toolchain }
    }

    /// Returns the underlying toolchain.
    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Runs `args`, feeding every output chunk to `sink`.
    ///
    /// Spawn failures surface as [`DotnetError::SpawnFailed`], a nonzero exit as
    /// [`DotnetError::ProcessFailed`] and cancellation as
    /// [`DotnetError::Cancelled`]. The sink is borrowed only while a chunk is
    /// ingested.
    pub async fn run<H: Host>(
        &self,
        args: &[String],
        sink: &RefCell<OutputSink<H>>,
        cancel: Option<&CancelToken>,
    ) -> Result<(), DotnetError> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            sink.borrow_mut().append(BUILD_CANCELLED_MESSAGE);
            return Err(DotnetError::Cancelled);
        }

        let process = self.toolchain.spawn(args)?;
        let result = drive(process, |_, chunk| sink.borrow_mut().next(chunk), cancel).await;

        if matches!(result, Err(DotnetError::Cancelled)) {
            sink.borrow_mut().append(BUILD_CANCELLED_MESSAGE);
        }

        result
    }

    /// Runs `args` and returns the last `###value###` marker in its output.
    ///
    /// The output is only scanned; nothing reaches a transcript or the
    /// problem list.
    pub async fn query_marker(
        &self,
        args: &[String],
        cancel: Option<&CancelToken>,
    ) -> Result<Option<String>, DotnetError> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(DotnetError::Cancelled);
        }

        let process = self.toolchain.spawn(args)?;
        let mut value = None;
        drive(
            process,
            |_, chunk| {
                if let Some(found) = extract_marker(chunk) {
                    value = Some(found.to_string());
                }
            },
            cancel,
        )
        .await?;

        Ok(value)
    }
}
