use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::mpsc::TryRecvError;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::output;
use crate::progress;
use crate::scan_events::ScanEvent;
use crate::scanner;
use crate::sigstore::{self, SignatureDb};
use crate::utils::display_path;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version)]
#[command(about = "Scan directory trees against a local database of known-bad file signatures")]
#[command(long_about = "Vigil fingerprints every file under a directory (MD5 + SHA-256, one \
    streaming pass) and flags files whose digest matches a stored signature.\n\n\
    Examples:\n  \
    vigil add samples/dropper.bin      # Store a file's digests as a signature\n  \
    vigil scan ~/Downloads             # Walk a tree and flag matches\n  \
    vigil list --json                  # Dump the signature database\n  \
    vigil remove 12                    # Delete signature with id 12")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the signature database (overrides the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan every file under a directory against stored signatures
    #[command(visible_alias = "s")]
    Scan {
        /// Root directory to scan
        path: PathBuf,
    },

    /// Hash files and store their signatures
    #[command(visible_alias = "a")]
    Add {
        /// Files to fingerprint and store
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List stored signatures, newest first
    #[command(visible_alias = "ls")]
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Remove a signature by id
    #[command(visible_alias = "rm")]
    Remove {
        /// Signature id as shown by `list`
        id: i64,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let config = Config::load();
        let db_path = config.resolve_database_path(self.database.clone());
        let store = SignatureDb::open(&db_path)
            .with_context(|| format!("Failed to open signature store at {}", db_path.display()))?;

        match self.command {
            Commands::Scan { path } => run_scan(store, path, &config),
            Commands::Add { files } => run_add(store, files, &config),
            Commands::List { json } => run_list(store, json),
            Commands::Remove { id } => run_remove(store, id),
        }
    }
}

/// Drive one scan: drain the event channel on a fixed tick and render.
///
/// This is the reference event consumer: the worker only pushes, we poll
/// and drain everything pending per tick, and the single terminal event is
/// what ends the loop.
fn run_scan(store: SignatureDb, path: PathBuf, config: &Config) -> Result<()> {
    if !path.is_dir() {
        bail!("Not a directory: {}", display_path(&path));
    }

    println!(
        "Scanning {} {}",
        display_path(&path).bold(),
        "(press Enter to cancel)".dimmed()
    );
    let handle = scanner::start_scan(path, store);

    // Cancellation is one-way; a stray Enter after the scan ends is harmless.
    let cancel = handle.cancel_token();
    thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            cancel.cancel();
        }
    });

    let poll_interval = Duration::from_millis(config.poll_interval_ms.max(1));
    let mut view = ScanView::new();

    loop {
        loop {
            match handle.events().try_recv() {
                Ok(event) => {
                    if let Some(result) = view.render(event) {
                        return result;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    bail!("Scan worker stopped without reporting a result");
                }
            }
        }
        thread::sleep(poll_interval);
    }
}

/// Terminal-UI state for a running scan.
struct ScanView {
    spinner: Option<ProgressBar>,
    bar: Option<ProgressBar>,
    detected: u64,
}

impl ScanView {
    fn new() -> Self {
        Self {
            spinner: Some(progress::counting_spinner()),
            bar: None,
            detected: 0,
        }
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            progress::finish_and_clear(&spinner);
        }
        if let Some(bar) = self.bar.take() {
            progress::finish_and_clear(&bar);
        }
    }

    /// Render one event; `Some` means the terminal event arrived.
    fn render(&mut self, event: ScanEvent) -> Option<Result<()>> {
        match event {
            ScanEvent::Status(text) => match &self.spinner {
                Some(spinner) => spinner.set_message(text),
                None => self.println(text.dimmed().to_string()),
            },
            ScanEvent::TotalFiles(total) => {
                if let Some(spinner) = self.spinner.take() {
                    progress::finish_and_clear(&spinner);
                }
                println!("{} files to scan.", total);
                self.bar = Some(progress::scan_bar(total));
            }
            ScanEvent::Progress(delta) => {
                if let Some(bar) = &self.bar {
                    bar.inc(delta);
                }
            }
            ScanEvent::Detected(path) => {
                self.detected += 1;
                self.println(format!(
                    "{} {}",
                    "DETECTED:".red().bold(),
                    display_path(&path)
                ));
                if let Some(bar) = &self.bar {
                    progress::set_detected(bar, self.detected);
                }
            }
            ScanEvent::FileError { path, reason } => {
                self.println(format!(
                    "{} {}: {}",
                    "File error:".yellow(),
                    display_path(&path),
                    reason
                ));
            }
            ScanEvent::DirError { path, reason } => {
                self.println(format!(
                    "{} {}: {}",
                    "Skipped directory:".yellow(),
                    display_path(&path),
                    reason
                ));
            }
            ScanEvent::Fatal(reason) => {
                self.clear();
                return Some(Err(anyhow::anyhow!(reason)));
            }
            ScanEvent::Cancelled(summary) => {
                self.clear();
                println!("{} {}", "Cancelled.".yellow().bold(), summary);
                return Some(Ok(()));
            }
            ScanEvent::Completed { scanned, detected } => {
                self.clear();
                let verdict = if detected == 0 {
                    "no matches".green().to_string()
                } else {
                    format!("{} detected", detected).red().bold().to_string()
                };
                println!("Scan complete: {} files scanned, {}.", scanned, verdict);
                return Some(Ok(()));
            }
        }
        None
    }
}

fn run_add(store: SignatureDb, files: Vec<PathBuf>, config: &Config) -> Result<()> {
    let report = sigstore::import_files(&store, &files, config.import_workers)?;
    output::print_import_report(&report);
    if !report.failed.is_empty() && report.added.is_empty() && report.duplicates.is_empty() {
        bail!("No files could be added");
    }
    Ok(())
}

fn run_list(store: SignatureDb, json: bool) -> Result<()> {
    let records = store.list_all()?;
    if json {
        output::print_signatures_json(&records)?;
    } else {
        output::print_signature_table(&records);
    }
    Ok(())
}

fn run_remove(store: SignatureDb, id: i64) -> Result<()> {
    let outcome = store.delete_by_id(id)?;
    if outcome.deleted {
        println!("{}", outcome.message);
        Ok(())
    } else {
        bail!(outcome.message)
    }
}
