//! SQLite operations for the signature store

use crate::sigstore::record::{DeleteOutcome, InsertOutcome, SignatureRecord};
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use colored::*;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Backoff before the single lookup retry on lock contention.
const LOCK_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Handle to the signature database.
///
/// Holds only the path: each operation opens a fresh connection so that
/// concurrent callers (scan worker, import workers, CLI commands) never
/// share one. Durability is per-call; no transaction spans a scan.
#[derive(Debug, Clone)]
pub struct SignatureDb {
    db_path: PathBuf,
}

impl SignatureDb {
    /// Open the store at `db_path`, creating the schema if needed.
    ///
    /// Safe to call from several processes or threads at once: schema and
    /// index creation are `IF NOT EXISTS`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            db_path: db_path.into(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Where this store lives on disk.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS signatures (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 md5 TEXT NOT NULL UNIQUE,
                 sha256 TEXT NOT NULL UNIQUE,
                 created_at DATETIME DEFAULT CURRENT_TIMESTAMP
             );
             CREATE INDEX IF NOT EXISTS idx_md5 ON signatures (md5);
             CREATE INDEX IF NOT EXISTS idx_sha256 ON signatures (sha256);",
        )
        .context("Failed to initialize signature schema")?;
        Ok(())
    }

    /// Open a fresh connection with the bounded lock-wait timeout.
    ///
    /// The scan worker holds one of these for the duration of a scan; every
    /// other operation opens and drops its own.
    pub fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open database: {}", self.db_path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;
        Ok(conn)
    }

    /// Store a digest pair. Duplicates on either column are reported, not
    /// inserted again.
    pub fn insert(&self, md5: &str, sha256: &str) -> Result<InsertOutcome> {
        let conn = self.connection()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO signatures (md5, sha256) VALUES (?1, ?2)",
                params![md5.trim(), sha256.trim()],
            )
            .context("Failed to insert signature")?;

        Ok(if changed > 0 {
            InsertOutcome {
                inserted: true,
                message: "Signature added.".to_string(),
            }
        } else {
            InsertOutcome {
                inserted: false,
                message: "A signature with this MD5 or SHA-256 already exists.".to_string(),
            }
        })
    }

    /// True iff a stored signature matches on either digest.
    ///
    /// Opens its own connection; the scan worker uses [`Self::lookup_with`]
    /// against its session connection instead.
    pub fn lookup(&self, md5: &str, sha256: &str) -> Result<bool> {
        let conn = self.connection()?;
        Ok(Self::lookup_with(&conn, md5, sha256))
    }

    /// Match either digest against the store through a caller-held
    /// connection.
    ///
    /// Lock contention gets one retry after a short backoff; a second
    /// failure degrades to "not found" with a warning, so a busy store
    /// never aborts a running scan.
    pub fn lookup_with(conn: &Connection, md5: &str, sha256: &str) -> bool {
        match query_digest_match(conn, md5, sha256) {
            Ok(found) => found,
            Err(err) if is_lock_contention(&err) => {
                std::thread::sleep(LOCK_RETRY_BACKOFF);
                match query_digest_match(conn, md5, sha256) {
                    Ok(found) => found,
                    Err(retry_err) => {
                        eprintln!(
                            "{} signature lookup failed after retry: {}",
                            "Warning:".yellow(),
                            retry_err
                        );
                        false
                    }
                }
            }
            Err(err) => {
                eprintln!("{} signature lookup failed: {}", "Warning:".yellow(), err);
                false
            }
        }
    }

    /// All stored signatures, newest first.
    pub fn list_all(&self) -> Result<Vec<SignatureRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT id, md5, sha256, created_at FROM signatures ORDER BY id DESC")
            .context("Failed to prepare signature listing")?;

        let rows = stmt
            .query_map([], |row| {
                let created_at: String = row.get(3)?;
                Ok(SignatureRecord {
                    id: row.get(0)?,
                    md5: row.get(1)?,
                    sha256: row.get(2)?,
                    created_at: parse_sqlite_timestamp(&created_at),
                })
            })
            .context("Failed to list signatures")?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("Failed to read signature row")?);
        }
        Ok(records)
    }

    /// Remove exactly one record by primary key.
    pub fn delete_by_id(&self, id: i64) -> Result<DeleteOutcome> {
        let conn = self.connection()?;
        let changed = conn
            .execute("DELETE FROM signatures WHERE id = ?1", [id])
            .context("Failed to delete signature")?;

        Ok(if changed > 0 {
            DeleteOutcome {
                deleted: true,
                message: format!("Deleted signature {}.", id),
            }
        } else {
            DeleteOutcome {
                deleted: false,
                message: format!("No signature with id {}.", id),
            }
        })
    }
}

fn query_digest_match(conn: &Connection, md5: &str, sha256: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM signatures WHERE md5 = ?1 OR sha256 = ?2",
        params![md5, sha256],
        |_| Ok(()),
    )
    .optional()
    .map(|hit| hit.is_some())
}

fn is_lock_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

/// SQLite's CURRENT_TIMESTAMP is UTC "YYYY-MM-DD HH:MM:SS" text.
fn parse_sqlite_timestamp(raw: &str) -> chrono::DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}
