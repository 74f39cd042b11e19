//! Cancelable directory traversal
//!
//! Wraps `walkdir` into a lazy iterator over regular files that survives
//! unreadable subtrees. Only two conditions halt a traversal: the cancel
//! token, and a root that cannot be opened at all.

use crate::scanner::CancelToken;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// One step of a traversal.
#[derive(Debug)]
pub enum WalkStep {
    /// A regular file to process.
    File(PathBuf),
    /// A subtree that could not be entered. Traversal continues with
    /// its siblings.
    DirError { path: PathBuf, reason: String },
}

/// A condition that ends the traversal early.
#[derive(Debug, Error)]
pub enum WalkHalt {
    #[error("cancelled")]
    Cancelled,
    #[error("cannot access scan root {}: {reason}", path.display())]
    Root { path: PathBuf, reason: String },
}

/// Lazy walk over every regular file under a root.
///
/// Each scan pass constructs a fresh `Walker`; the iterator fuses after
/// yielding a halt.
pub struct Walker {
    root: PathBuf,
    iter: walkdir::IntoIter,
    cancel: CancelToken,
    halted: bool,
}

impl Walker {
    pub fn new(root: &Path, cancel: CancelToken) -> Self {
        Self {
            root: root.to_path_buf(),
            iter: WalkDir::new(root).follow_links(false).into_iter(),
            cancel,
            halted: false,
        }
    }
}

impl Iterator for Walker {
    type Item = Result<WalkStep, WalkHalt>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.halted {
                return None;
            }
            // Checked before every entry, so cancellation latency is bounded
            // by the file currently in flight.
            if self.cancel.is_cancelled() {
                self.halted = true;
                return Some(Err(WalkHalt::Cancelled));
            }

            let entry = self.iter.next()?;
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    return Some(Ok(WalkStep::File(entry.into_path())));
                }
                // Directories and symlinks are traversal structure, not
                // scan targets.
                Ok(_) => continue,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    let reason = err
                        .io_error()
                        .map(|io| io.to_string())
                        .unwrap_or_else(|| err.to_string());

                    // Depth 0 is the root itself; nothing below it can be
                    // enumerated.
                    if err.depth() == 0 {
                        self.halted = true;
                        return Some(Err(WalkHalt::Root { path, reason }));
                    }
                    return Some(Ok(WalkStep::DirError { path, reason }));
                }
            }
        }
    }
}
