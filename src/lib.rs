//! Vigil library crate
//!
//! Signature-based file integrity scanning: a dual-hash digest engine, a
//! persisted SQLite signature store, and a cancelable background scan
//! pipeline that streams progress events to any frontend.

pub mod cli;
pub mod config;
pub mod digest;
pub mod output;
pub mod progress;
pub mod scan_events;
pub mod scanner;
pub mod sigstore;
pub mod utils;
pub mod walker;
