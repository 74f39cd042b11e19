//! Dual-hash digest computation for scanned files
//!
//! Every file is fingerprinted by an MD5 and a SHA-256 digest computed in a
//! single streaming pass, matching the two indexed columns of the signature
//! store.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

/// Read granularity for the hashing pass. Files are never loaded whole.
pub const CHUNK_SIZE: usize = 4096;

/// Digest pair for one file, as lowercase hex strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    /// 128-bit MD5 digest (32 hex chars).
    pub md5: String,
    /// 256-bit SHA-256 digest (64 hex chars).
    pub sha256: String,
}

/// Why a file could not be hashed.
///
/// These are return values, not aborts: the scan loop consumes them and
/// keeps going.
#[derive(Debug, Error)]
pub enum DigestError {
    /// The file exists but the process may not read it.
    #[error("permission denied")]
    AccessDenied,
    /// Any other I/O failure while opening or reading.
    #[error("{0}")]
    Read(io::Error),
}

impl From<io::Error> for DigestError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            DigestError::AccessDenied
        } else {
            DigestError::Read(err)
        }
    }
}

/// Compute both digests of a file in one chunked read pass.
///
/// Also the standalone entry point for "add this file as a signature".
pub fn digest_file(path: &Path) -> Result<FileDigests, DigestError> {
    let mut file = File::open(path)?;

    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        let chunk = &buffer[..bytes_read];
        md5.update(chunk);
        sha256.update(chunk);
    }

    Ok(FileDigests {
        md5: format!("{:x}", md5.finalize()),
        sha256: format!("{:x}", sha256.finalize()),
    })
}
