//! Human and JSON rendering for CLI results

use crate::sigstore::{ImportReport, SignatureRecord};
use crate::utils::display_path;
use anyhow::Result;
use colored::*;
use serde::Serialize;

#[derive(Serialize)]
struct JsonSignature<'a> {
    id: i64,
    md5: &'a str,
    sha256: &'a str,
    created_at: String,
}

/// Print the signature listing as a table.
pub fn print_signature_table(records: &[SignatureRecord]) {
    if records.is_empty() {
        println!("No signatures stored.");
        return;
    }

    println!(
        "{:<6} {:<32} {:<64} {}",
        "ID".bold(),
        "MD5".bold(),
        "SHA-256".bold(),
        "Added".bold()
    );
    for record in records {
        println!(
            "{:<6} {:<32} {:<64} {}",
            record.id,
            record.md5,
            record.sha256,
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!();
    println!("{} signature(s).", records.len());
}

/// Print the signature listing as JSON for scripting.
pub fn print_signatures_json(records: &[SignatureRecord]) -> Result<()> {
    let rows: Vec<JsonSignature> = records
        .iter()
        .map(|record| JsonSignature {
            id: record.id,
            md5: &record.md5,
            sha256: &record.sha256,
            created_at: record.created_at.to_rfc3339(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

/// Summarize a bulk import.
pub fn print_import_report(report: &ImportReport) {
    for path in &report.added {
        println!("{} {}", "Added:".green(), display_path(path));
    }
    for path in &report.duplicates {
        println!("{} {}", "Already known:".yellow(), display_path(path));
    }
    for (path, reason) in &report.failed {
        eprintln!("{} {}: {}", "Failed:".red(), display_path(path), reason);
    }
    println!(
        "{} added, {} duplicates, {} failed.",
        report.added.len(),
        report.duplicates.len(),
        report.failed.len()
    );
}
