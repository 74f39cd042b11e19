//! Progress events emitted during a scan (consumed by the CLI or any other frontend)

use std::path::PathBuf;

/// Real-time updates pushed by the scan worker.
///
/// Events arrive in chronological order on a single channel. Exactly one of
/// the terminal variants (`Completed`, `Cancelled`, `Fatal`) ends the stream
/// for a given scan.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Human-readable phase announcement.
    Status(String),

    /// Result of the counting pass; sent at most once, before any
    /// per-file event.
    TotalFiles(u64),

    /// Incremental progress: one unit per file visited, whatever the
    /// outcome for that file.
    Progress(u64),

    /// A file's digest matched a stored signature.
    Detected(PathBuf),

    /// A single file could not be hashed; the scan continued.
    FileError { path: PathBuf, reason: String },

    /// A subtree could not be entered; its siblings were still scanned.
    DirError { path: PathBuf, reason: String },

    /// The job died: root inaccessible, store unreachable, or an
    /// unexpected failure escaping a phase.
    Fatal(String),

    /// The cancel token was observed; no further files were processed.
    Cancelled(String),

    /// The scan ran to the end of the tree.
    Completed { scanned: u64, detected: u64 },
}

impl ScanEvent {
    /// True for the three variants that end a scan's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanEvent::Fatal(_) | ScanEvent::Cancelled(_) | ScanEvent::Completed { .. }
        )
    }
}
