//! Host surfaces: the transcript, the problem list, and user notices.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use msbuild_diagnostics::Diagnostic;
use std::io::Write;

/// The embedding environment a build reports into.
///
/// A host owns the visible transcript surface and mirrors the per-file
/// problem list. Implementations only display; all bookkeeping lives in
/// [`crate::sink::OutputSink`].
pub trait Host {
    /// Creates the transcript surface. Called at most once per sink.
    fn open_transcript(&mut self) {}

    /// Brings the transcript into view.
    fn reveal_transcript(&mut self);

    /// Appends raw text to the transcript.
    fn append_transcript(&mut self, text: &str);

    /// Empties the transcript.
    fn clear_transcript(&mut self);

    /// Replaces the full problem list for one file.
    fn set_diagnostics(&mut self, file: &Utf8Path, diagnostics: &[Diagnostic]);

    /// Removes every mirrored problem.
    fn clear_diagnostics(&mut self);

    /// Shows a one-shot notice to the user.
    fn show_notice(&mut self, message: &str);

    /// Records a best-effort telemetry event.
    fn report_event(&mut self, event: &str) {
        tracing::debug!(event, "host event");
    }
}

/// Where the console transcript is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptTarget {
    Stdout,
    Stderr,
}

/// A terminal host: streams the transcript and keeps the problem list for
/// printing after the session.
#[derive(Debug)]
pub struct ConsoleHost {
    target: TranscriptTarget,
    problems: IndexMap<Utf8PathBuf, Vec<Diagnostic>>,
    notices: usize,
}

impl ConsoleHost {
    /// Creates a console host writing the transcript to `target`.
    pub fn new(target: TranscriptTarget) -> Self {
        Self {
            target,
            problems: IndexMap::new(),
            notices: 0,
        }
    }

    /// Iterates mirrored problems in discovery order, skipping emptied files.
    pub fn problems(&self) -> impl Iterator<Item = (&Utf8Path, &[Diagnostic])> {
        self.problems
            .iter()
            .filter(|(_, diags)| !diags.is_empty())
            .map(|(file, diags)| (file.as_path(), diags.as_slice()))
    }

    /// Returns how many notices were shown.
    pub fn notice_count(&self) -> usize {
        self.notices
    }

    fn write(&self, text: &str) {
        let result = match self.target {
            TranscriptTarget::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(text.as_bytes()).and_then(|_| out.flush())
            }
            TranscriptTarget::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(text.as_bytes()).and_then(|_| err.flush())
            }
        };
        if let Err(e) = result {
            tracing::warn!("failed to write transcript: {e}");
        }
    }
}

impl Host for ConsoleHost {
    fn reveal_transcript(&mut self) {}

    fn append_transcript(&mut self, text: &str) {
        self.write(text);
    }

    fn clear_transcript(&mut self) {}

    fn set_diagnostics(&mut self, file: &Utf8Path, diagnostics: &[Diagnostic]) {
        self.problems
            .insert(file.to_path_buf(), diagnostics.to_vec());
    }

    fn clear_diagnostics(&mut self) {
        self.problems.clear();
    }

    fn show_notice(&mut self, message: &str) {
        self.notices += 1;
        eprintln!("Error: {}", message);
    }
}

/// A host that records everything in memory.
///
/// Useful for headless embedding, where the caller inspects the transcript
/// and problem list after a session.
#[derive(Debug, Default)]
pub struct MemoryHost {
    /// Transcript text since the last clear.
    pub transcript: String,
    /// Mirrored problems per file.
    pub problems: IndexMap<Utf8PathBuf, Vec<Diagnostic>>,
    /// Notices shown, in order.
    pub notices: Vec<String>,
    /// Telemetry events, in order.
    pub events: Vec<String>,
    /// Number of times the transcript surface was created.
    pub opened: usize,
    /// Number of times the transcript was revealed.
    pub revealed: usize,
}

impl Host for MemoryHost {
    fn open_transcript(&mut self) {
        self.opened += 1;
    }

    fn reveal_transcript(&mut self) {
        self.revealed += 1;
    }

    fn append_transcript(&mut self, text: &str) {
        self.transcript.push_str(text);
    }

    fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    fn set_diagnostics(&mut self, file: &Utf8Path, diagnostics: &[Diagnostic]) {
        self.problems
            .insert(file.to_path_buf(), diagnostics.to_vec());
    }

    fn clear_diagnostics(&mut self) {
        self.problems.clear();
    }

    fn show_notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn report_event(&mut self, event: &str) {
        self.events.push(event.to_string());
    }
}
