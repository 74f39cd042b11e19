//! Signature record and operation-outcome types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One persisted known-bad digest pair.
///
/// Records are created by explicit add/import, never mutated, and removed
/// only by id-based delete.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureRecord {
    pub id: i64,
    pub md5: String,
    pub sha256: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

/// Result of an insert attempt.
///
/// A duplicate on either digest column is an outcome, not an error.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub inserted: bool,
    pub message: String,
}

/// Result of an id-based delete.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub deleted: bool,
    pub message: String,
}
