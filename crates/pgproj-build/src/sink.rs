//! The output sink: transcript plus diagnostic registry.

use crate::host::Host;
use camino::Utf8PathBuf;
use indexmap::IndexSet;
use msbuild_diagnostics::{extract_marker, parse_output, DedupKey, DiagnosticRegistry};

/// Telemetry event reported when a chunk contained unparseable diagnostics.
pub const PARSE_FAILED_EVENT: &str = "FailedToParseBuildMessage";

/// Owns the transcript and the per-file diagnostic registry, and mirrors both
/// onto a [`Host`].
///
/// Between two calls to [`OutputSink::clear`] every operation is additive.
#[derive(Debug)]
pub struct OutputSink<H> {
    host: H,
    transcript: String,
    registry: DiagnosticRegistry,
    output_file_path: Option<String>,
    opened: bool,
}

impl<H: Host> OutputSink<H> {
    /// Creates a sink reporting into `host`.
    pub fn new(host: H, dedup: DedupKey) -> Self {
        Self {
            host,
            transcript: String::new(),
            registry: DiagnosticRegistry::with_dedup(dedup),
            output_file_path: None,
            opened: false,
        }
    }

    /// Creates the transcript surface on first use and reveals it.
    pub fn show(&mut self) {
        self.ensure_open();
        self.host.reveal_transcript();
    }

    /// Appends a line to the transcript.
    pub fn append(&mut self, text: &str) {
        self.write(text);
        self.write("\n");
    }

    /// Ingests a raw output chunk.
    ///
    /// The chunk is appended verbatim, scanned for a `###value###` marker, and
    /// parsed for diagnostics. Every file that appeared in the chunk has its full
    /// list republished to the host.
    pub fn next(&mut self, chunk: &str) {
        self.write(chunk);

        if let Some(value) = extract_marker(chunk) {
            self.output_file_path = Some(value.to_string());
        }

        let parsed = parse_output(chunk);
        if !parsed.errors.is_empty() {
            for error in &parsed.errors {
                tracing::debug!("skipping build message: {error}");
            }
            self.host.report_event(PARSE_FAILED_EVENT);
        }

        let mut touched: IndexSet<Utf8PathBuf> = IndexSet::new();
        for diagnostic in parsed.diagnostics {
            touched.insert(diagnostic.file.clone());
            self.registry.insert(diagnostic);
        }

        for file in &touched {
            self.host.set_diagnostics(file, self.registry.get(file));
        }
    }

    /// Empties the transcript, the registry and the host's problem list.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.registry.clear();
        self.output_file_path = None;
        if self.opened {
            self.host.clear_transcript();
        }
        self.host.clear_diagnostics();
    }

    /// Returns the last side-channel value seen and resets it.
    pub fn take_output_file_path(&mut self) -> Option<String> {
        self.output_file_path.take()
    }

    /// Returns the transcript since the last clear.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Returns the diagnostic registry.
    pub fn registry(&self) -> &DiagnosticRegistry {
        &self.registry
    }

    /// Returns the host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Returns the host mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Consumes the sink, returning the host.
    pub fn into_host(self) -> H {
        self.host
    }

    fn ensure_open(&mut self) {
        if !self.opened {
            self.host.open_transcript();
            self.opened = true;
        }
    }

    fn write(&mut self, text: &str) {
        self.ensure_open();
        self.transcript.push_str(text);
        self.host.append_transcript(text);
    }
}
