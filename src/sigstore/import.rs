//! Bulk signature import over a bounded worker pool

use crate::digest;
use crate::sigstore::database::SignatureDb;
use crate::sigstore::record::InsertOutcome;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Default pool size for concurrent adds. Bounded so a bulk import never
/// opens an unbounded number of store connections.
pub const IMPORT_WORKERS: usize = 5;

/// Per-path outcome of a bulk import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: Vec<PathBuf>,
    pub duplicates: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.added.len() + self.duplicates.len() + self.failed.len()
    }
}

/// Hash one file and store its digest pair.
///
/// The "add this file as a signature" flow: the standalone digest function
/// feeding a single insert on a fresh connection.
pub fn add_file(store: &SignatureDb, path: &Path) -> Result<InsertOutcome> {
    let digests = digest::digest_file(path)
        .with_context(|| format!("Failed to hash {}", path.display()))?;
    store.insert(&digests.md5, &digests.sha256)
}

/// Import many files concurrently on a pool of `workers` threads.
///
/// Each task hashes its file and inserts through its own connection;
/// failures are collected per path, never aborting the batch.
pub fn import_files(store: &SignatureDb, paths: &[PathBuf], workers: usize) -> Result<ImportReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("Failed to build import worker pool")?;

    let outcomes: Vec<(PathBuf, Result<InsertOutcome>)> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| (path.clone(), add_file(store, path)))
            .collect()
    });

    let mut report = ImportReport::default();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(insert) if insert.inserted => report.added.push(path),
            Ok(_) => report.duplicates.push(path),
            Err(err) => report.failed.push((path, format!("{:#}", err))),
        }
    }
    Ok(report)
}
