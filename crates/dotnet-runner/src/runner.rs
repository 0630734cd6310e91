//! dotnet process runner.

use crate::process::{OutputStream, ProcessEvent, Toolchain, ToolchainProcess};
use crate::version::parse_version;
use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// How long output readers may keep draining after a kill.
const KILL_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Error types for the dotnet runner.
#[derive(Debug, Error)]
pub enum DotnetError {
    /// Failed to spawn the dotnet process.
    #[error("failed to spawn dotnet: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// The process ran and exited unsuccessfully.
    #[error("dotnet exited with {}", describe_exit(.code))]
    ProcessFailed { code: Option<i32> },

    /// The process was cancelled before it finished.
    #[error("dotnet run was cancelled")]
    Cancelled,

    /// Waiting on the process failed.
    #[error("failed to wait for dotnet: {0}")]
    WaitFailed(String),

    /// The event channel closed without an exit status.
    #[error("dotnet process ended without reporting an exit status")]
    Disconnected,

    /// The dotnet executable could not be located.
    #[error("the .NET SDK was not found")]
    NotFound,

    /// `dotnet --version` printed something unusable.
    #[error("failed to query dotnet version: {0}")]
    VersionQueryFailed(String),

    /// The installed SDK is older than required.
    #[error("the .NET SDK version {required} or later is required, but {found} was found")]
    SdkTooOld { required: String, found: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// The dotnet runner.
#[derive(Debug, Clone)]
pub struct DotnetRunner {
    /// Path to the dotnet executable.
    dotnet_path: Utf8PathBuf,
    /// Working directory for spawned processes.
    working_dir: Option<Utf8PathBuf>,
}

impl DotnetRunner {
    /// Creates a new runner for the given executable.
    pub fn new(dotnet_path: Utf8PathBuf) -> Self {
        Self {
            dotnet_path,
            working_dir: None,
        }
    }

    /// Sets the working directory for spawned processes.
    pub fn with_working_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Returns the executable path.
    pub fn dotnet_path(&self) -> &Utf8Path {
        &self.dotnet_path
    }

    /// Attempts to find dotnet.
    ///
    /// Search order:
    /// 1. `$DOTNET_ROOT/dotnet`
    /// 2. System PATH
    /// 3. Common installation locations
    pub fn find_dotnet() -> Option<Utf8PathBuf> {
        let exe = if cfg!(windows) { "dotnet.exe" } else { "dotnet" };

        if let Ok(root) = std::env::var("DOTNET_ROOT") {
            let candidate = Utf8PathBuf::from(root).join(exe);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        if let Ok(path) = which::which("dotnet") {
            if let Ok(utf8_path) = Utf8PathBuf::try_from(path) {
                return Some(utf8_path);
            }
        }

        let common_paths = [
            "~/.dotnet/dotnet",
            "/usr/local/share/dotnet/dotnet",
            "/usr/share/dotnet/dotnet",
            "/usr/lib/dotnet/dotnet",
        ];

        for path in common_paths {
            let expanded = shellexpand::tilde(path);
            let path = Utf8Path::new(expanded.as_ref());
            if path.exists() {
                return Some(path.to_owned());
            }
        }

        None
    }

    /// Gets the version of the installed SDK.
    ///
    /// Returns a tuple of (version_string, path).
    pub async fn get_dotnet_version() -> Result<(String, Utf8PathBuf), DotnetError> {
        let dotnet_path = Self::find_dotnet().ok_or(DotnetError::NotFound)?;
        let version = Self::new(dotnet_path.clone()).version().await?;
        Ok((version, dotnet_path))
    }

    /// Runs `dotnet --version` with this runner's executable.
    pub async fn version(&self) -> Result<String, DotnetError> {
        let output = Command::new(&self.dotnet_path)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(DotnetError::SpawnFailed)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Err(DotnetError::VersionQueryFailed(stderr.trim().to_string()));
        }
        if !output.status.success() {
            return Err(DotnetError::ProcessFailed {
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Fails unless the installed SDK is at least `required`.
    pub async fn require_sdk(&self, required: &str) -> Result<Version, DotnetError> {
        let found = self.version().await?;
        check_sdk_version(required, &found)
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.dotnet_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        // Build nodes inherit the pipes; a group kill reaches them too.
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

/// Compares a reported SDK version against a required minimum.
pub fn check_sdk_version(required: &str, found: &str) -> Result<Version, DotnetError> {
    let found_version = parse_version(found)
        .ok_or_else(|| DotnetError::VersionQueryFailed(format!("unrecognized version `{found}`")))?;
    let required_version = parse_version(required).ok_or_else(|| {
        DotnetError::VersionQueryFailed(format!("unrecognized required version `{required}`"))
    })?;

    if found_version < required_version {
        return Err(DotnetError::SdkTooOld {
            required: required.to_string(),
            found: found.to_string(),
        });
    }

    Ok(found_version)
}

impl Toolchain for DotnetRunner {
    fn spawn(&self, args: &[String]) -> Result<ToolchainProcess, DotnetError> {
        tracing::debug!(dotnet = %self.dotnet_path, ?args, "spawning dotnet");

        let mut child = self.command(args).spawn().map_err(DotnetError::SpawnFailed)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_stream(
                stdout,
                OutputStream::Stdout,
                events_tx.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_stream(
                stderr,
                OutputStream::Stderr,
                events_tx.clone(),
            )));
        }

        tokio::spawn(supervise(child, kill_rx, readers, events_tx));

        Ok(ToolchainProcess::new(events_rx, kill_tx))
    }
}

/// Waits for the child, or kills it when asked. Sends exactly one terminal event.
async fn supervise(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    readers: Vec<JoinHandle<()>>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let pid = child.id();

    // A dropped handle counts as a kill request.
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            kill_process_tree(&mut child).await;
            tracing::debug!(?pid, "dotnet killed");
            drain_after_kill(readers).await;
            let _ = events.send(ProcessEvent::Killed);
            return;
        }
    };

    for reader in readers {
        let _ = reader.await;
    }

    let event = match status {
        Ok(status) => {
            tracing::debug!(?pid, code = ?status.code(), "dotnet exited");
            ProcessEvent::Exited {
                code: status.code(),
            }
        }
        Err(e) => {
            tracing::warn!(?pid, "failed to wait for dotnet: {e}");
            ProcessEvent::Failed(e.to_string())
        }
    };
    let _ = events.send(event);
}

/// Kills the child and, on Unix, every process in its group.
async fn kill_process_tree(child: &mut Child) {
    let pid = child.id();

    #[cfg(unix)]
    if let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) {
        // SAFETY: killpg only sends a signal; the group was created at spawn.
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
            if let Err(e) = child.wait().await {
                tracing::warn!(?pid, "failed to reap dotnet: {e}");
            }
            return;
        }
        tracing::debug!(?pid, "process group kill failed: {}", std::io::Error::last_os_error());
    }

    if let Err(e) = child.kill().await {
        tracing::warn!(?pid, "failed to kill dotnet: {e}");
    }
}

/// Lets readers flush what was already written, then abandons any pipe still
/// held open by a process outside the killed group.
async fn drain_after_kill(readers: Vec<JoinHandle<()>>) {
    let deadline = tokio::time::Instant::now() + KILL_DRAIN_TIMEOUT;
    for mut reader in readers {
        if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
            tracing::warn!("dotnet output still open after kill, abandoning reader");
            reader.abort();
        }
    }
}

/// Reads a pipe in raw blocks and forwards each decoded block.
async fn forward_stream<R>(
    mut reader: R,
    stream: OutputStream,
    events: mpsc::UnboundedSender<ProcessEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut decoder = Utf8Chunker::default();

    loop {
        let read = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(?stream, "failed to read dotnet output: {e}");
                break;
            }
        };

        let text = decoder.push(&buffer[..read]);
        if !text.is_empty() && events.send(ProcessEvent::Output { stream, text }).is_err() {
            return;
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        let _ = events.send(ProcessEvent::Output { stream, text: rest });
    }
}

/// Decodes UTF-8 across block boundaries.
///
/// An incomplete multi-byte sequence at the end of a block is held back until
/// the next block; invalid bytes are replaced.
#[derive(Debug, Default)]
struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };

        let rest = self.pending.split_off(complete);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        text
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}
