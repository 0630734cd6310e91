//! Per-file diagnostic registry.

use crate::diagnostic::Diagnostic;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How duplicate diagnostics within one file are detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupKey {
    /// Two diagnostics with the same message text are duplicates.
    #[default]
    Message,
    /// Duplicates must also share code, severity and range.
    Location,
}

impl DedupKey {
    fn is_duplicate(self, existing: &Diagnostic, candidate: &Diagnostic) -> bool {
        match self {
            DedupKey::Message => existing.message == candidate.message,
            DedupKey::Location => existing == candidate,
        }
    }
}

/// Diagnostics grouped by file, in discovery order.
#[derive(Debug, Default)]
pub struct DiagnosticRegistry {
    files: IndexMap<Utf8PathBuf, Vec<Diagnostic>>,
    dedup: DedupKey,
}

impl DiagnosticRegistry {
    /// Creates an empty registry with message-based deduplication.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with the given deduplication key.
    pub fn with_dedup(dedup: DedupKey) -> Self {
        Self {
            files: IndexMap::new(),
            dedup,
        }
    }

    /// Adds a diagnostic to its file's bucket.
    ///
    /// Returns false if an equivalent diagnostic was already stored.
    pub fn insert(&mut self, diagnostic: Diagnostic) -> bool {
        let dedup = self.dedup;
        let bucket = self.files.entry(diagnostic.file.clone()).or_default();
        // Buckets stay small, a linear scan is enough.
        if bucket
            .iter()
            .any(|existing| dedup.is_duplicate(existing, &diagnostic))
        {
            return false;
        }
        bucket.push(diagnostic);
        true
    }

    /// Returns the diagnostics recorded for a file.
    pub fn get(&self, file: &Utf8Path) -> &[Diagnostic] {
        self.files.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates files and their diagnostics in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&Utf8Path, &[Diagnostic])> {
        self.files
            .iter()
            .map(|(file, diags)| (file.as_path(), diags.as_slice()))
    }

    /// Returns the number of files with diagnostics.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Returns the total number of diagnostics.
    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Returns true if no diagnostics are stored.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Removes every diagnostic.
    pub fn clear(&mut self) {
        self.files.clear();
    }
}
