//! Persisted signature store
//!
//! Known-bad digest pairs live in a local SQLite database, uniquely indexed
//! on both digest columns. Every logical caller (the scan worker, each
//! import worker, the CLI) opens its own connection; there is no shared
//! handle.

pub mod database;
pub mod import;
pub mod record;

pub use database::SignatureDb;
pub use import::{import_files, ImportReport, IMPORT_WORKERS};
pub use record::{DeleteOutcome, InsertOutcome, SignatureRecord};
