//! Toolchain process events.

use crate::cancel::CancelToken;
use crate::runner::DotnetError;
use tokio::sync::{mpsc, oneshot};

/// Which pipe a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// An event produced by a running toolchain process.
///
/// Output chunks from one stream arrive in order; chunks from stdout and stderr
/// may interleave arbitrarily. The terminal event is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of decoded output.
    Output { stream: OutputStream, text: String },
    /// The process exited. `None` when it was terminated by a signal.
    Exited { code: Option<i32> },
    /// The process was killed on request.
    Killed,
    /// Waiting on the process failed.
    Failed(String),
}

impl ProcessEvent {
    fn is_terminal(&self) -> bool {
        !matches!(self, ProcessEvent::Output { .. })
    }
}

/// Something that can start the external toolchain.
pub trait Toolchain {
    /// Starts the toolchain with the given arguments.
    ///
    /// Fails with [`DotnetError::SpawnFailed`] when the executable cannot be launched.
    fn spawn(&self, args: &[String]) -> Result<ToolchainProcess, DotnetError>;
}

/// A handle to a started toolchain process.
///
/// Consumers receive [`ProcessEvent`]s from a channel and may request a kill.
#[derive(Debug)]
pub struct ToolchainProcess {
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    kill: Option<oneshot::Sender<()>>,
}

impl ToolchainProcess {
    /// Wraps an event channel and a kill switch.
    pub fn new(events: mpsc::UnboundedReceiver<ProcessEvent>, kill: oneshot::Sender<()>) -> Self {
        Self {
            events,
            kill: Some(kill),
        }
    }

    /// Receives the next event, or `None` once the producer is gone.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Requests termination. Returns false if a kill was already requested.
    pub fn kill(&mut self) -> bool {
        match self.kill.take() {
            Some(kill) => {
                let _ = kill.send(());
                true
            }
            None => false,
        }
    }
}

/// Drives a process to completion, forwarding every output chunk.
///
/// Exit code 0 is success; any other exit is [`DotnetError::ProcessFailed`].
/// When `cancel` fires first the process is killed, output that was already
/// produced is still forwarded, and [`DotnetError::Cancelled`] is returned.
pub async fn drive<F>(
    mut process: ToolchainProcess,
    mut on_output: F,
    cancel: Option<&CancelToken>,
) -> Result<(), DotnetError>
where
    F: FnMut(OutputStream, &str),
{
    loop {
        let event = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return kill_and_drain(process, on_output).await;
                    }
                    event = process.next_event() => event,
                }
            }
            None => process.next_event().await,
        };

        match event {
            Some(ProcessEvent::Output { stream, text }) => on_output(stream, &text),
            Some(ProcessEvent::Exited { code: Some(0) }) => return Ok(()),
            Some(ProcessEvent::Exited { code }) => return Err(DotnetError::ProcessFailed { code }),
            Some(ProcessEvent::Killed) => return Err(DotnetError::Cancelled),
            Some(ProcessEvent::Failed(message)) => return Err(DotnetError::WaitFailed(message)),
            None => return Err(DotnetError::Disconnected),
        }
    }
}

async fn kill_and_drain<F>(mut process: ToolchainProcess, mut on_output: F) -> Result<(), DotnetError>
where
    F: FnMut(OutputStream, &str),
{
    tracing::debug!("cancellation requested, killing toolchain process");
    process.kill();

    while let Some(event) = process.next_event().await {
        if let ProcessEvent::Output { stream, text } = &event {
            on_output(*stream, text);
        }
        if event.is_terminal() {
            break;
        }
    }

    Err(DotnetError::Cancelled)
}
