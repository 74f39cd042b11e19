//! Scan orchestration
//!
//! Each scan runs on one dedicated worker thread: a counting pass over the
//! tree, then a scanning pass that digests every file and checks it against
//! the signature store. The worker only ever pushes events; the consumer
//! polls the channel and may set the cancel token. Every job ends with
//! exactly one terminal event.

use crate::digest;
use crate::scan_events::ScanEvent;
use crate::sigstore::SignatureDb;
use crate::utils::display_path;
use crate::walker::{WalkHalt, WalkStep, Walker};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// One-way cancellation flag for a single scan job.
///
/// Set once by the consumer, only read by the worker. A fresh token is
/// created per job; there is no reset and no pause/resume.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Caller's handle to a running scan: the event stream plus cancellation.
///
/// The worker never blocks on the caller; dropping the handle simply leaves
/// the worker to finish into a disconnected channel.
pub struct ScanHandle {
    events: Receiver<ScanEvent>,
    cancel: CancelToken,
}

impl ScanHandle {
    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Start scanning `root` against `store` on a background worker thread.
pub fn start_scan(root: PathBuf, store: SignatureDb) -> ScanHandle {
    let (tx, rx) = channel();
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    thread::spawn(move || {
        let terminal = scan_job(&root, &store, &tx, &worker_cancel);
        let _ = tx.send(terminal);
    });

    ScanHandle { events: rx, cancel }
}

/// Run one whole job and return its terminal event.
///
/// Phases never re-enter: counting, then scanning, then done. Failures that
/// compromise the whole job (unreachable store, inaccessible root) become
/// the `Fatal` terminal; everything file- or directory-local is emitted as
/// a non-terminal event and the walk continues.
fn scan_job(
    root: &Path,
    store: &SignatureDb,
    tx: &Sender<ScanEvent>,
    cancel: &CancelToken,
) -> ScanEvent {
    // The whole job depends on the store; fail up front if it is unreachable.
    let conn = match store.connection() {
        Ok(conn) => conn,
        Err(err) => return ScanEvent::Fatal(format!("Cannot open signature store: {:#}", err)),
    };

    let _ = tx.send(ScanEvent::Status("Counting files...".to_string()));
    let mut total: u64 = 0;
    for step in Walker::new(root, cancel.clone()) {
        match step {
            Ok(WalkStep::File(_)) => total += 1,
            Ok(WalkStep::DirError { path, reason }) => {
                let _ = tx.send(ScanEvent::DirError { path, reason });
            }
            Err(WalkHalt::Cancelled) => {
                return ScanEvent::Cancelled("Scan cancelled while counting files.".to_string());
            }
            Err(WalkHalt::Root { path, reason }) => {
                return ScanEvent::Fatal(format!(
                    "Cannot access scan root {}: {}",
                    display_path(&path),
                    reason
                ));
            }
        }
    }

    let _ = tx.send(ScanEvent::TotalFiles(total));
    if total == 0 {
        return ScanEvent::Completed {
            scanned: 0,
            detected: 0,
        };
    }

    // Second, independent walk. The tree is assumed stable between passes;
    // totals carry no guarantee if it is not.
    let _ = tx.send(ScanEvent::Status(format!("Scanning {} files...", total)));
    let mut scanned: u64 = 0;
    let mut detected: u64 = 0;
    for step in Walker::new(root, cancel.clone()) {
        match step {
            Ok(WalkStep::File(path)) => {
                scanned += 1;
                match digest::digest_file(&path) {
                    Ok(digests) => {
                        // One detection per file, even when both digests match
                        if SignatureDb::lookup_with(&conn, &digests.md5, &digests.sha256) {
                            detected += 1;
                            let _ = tx.send(ScanEvent::Detected(path));
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(ScanEvent::FileError {
                            path,
                            reason: err.to_string(),
                        });
                    }
                }
                let _ = tx.send(ScanEvent::Progress(1));
            }
            Ok(WalkStep::DirError { path, reason }) => {
                let _ = tx.send(ScanEvent::DirError { path, reason });
            }
            Err(WalkHalt::Cancelled) => {
                return ScanEvent::Cancelled(format!(
                    "Scan cancelled after {} of {} files.",
                    scanned, total
                ));
            }
            Err(WalkHalt::Root { path, reason }) => {
                return ScanEvent::Fatal(format!(
                    "Cannot access scan root {}: {}",
                    display_path(&path),
                    reason
                ));
            }
        }
    }

    ScanEvent::Completed { scanned, detected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigstore::import::add_file;
    use std::fs;
    use tempfile::TempDir;

    fn setup_store(temp_dir: &TempDir) -> SignatureDb {
        SignatureDb::open(temp_dir.path().join("signatures.db")).unwrap()
    }

    /// Receive until the terminal event (inclusive).
    fn drain_events(handle: &ScanHandle) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = handle.events().recv() {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    fn progress_count(events: &[ScanEvent]) -> u64 {
        events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Progress(delta) => Some(*delta),
                _ => None,
            })
            .sum()
    }

    fn detected_paths(events: &[ScanEvent]) -> Vec<PathBuf> {
        events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Detected(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_scan_with_planted_match() {
        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);

        let root = temp_dir.path().join("tree");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("clean_a.txt"), "harmless").unwrap();
        fs::write(root.join("sub/clean_b.txt"), "also harmless").unwrap();
        let bad = root.join("sub/bad.bin");
        fs::write(&bad, "planted payload").unwrap();
        assert!(add_file(&store, &bad).unwrap().inserted);

        let handle = start_scan(root, store);
        let events = drain_events(&handle);

        // TotalFiles once, before any per-file event
        let total_pos = events
            .iter()
            .position(|e| matches!(e, ScanEvent::TotalFiles(3)))
            .expect("TotalFiles(3) missing");
        let first_file_event = events
            .iter()
            .position(|e| {
                matches!(
                    e,
                    ScanEvent::Progress(_) | ScanEvent::Detected(_) | ScanEvent::FileError { .. }
                )
            })
            .unwrap();
        assert!(total_pos < first_file_event);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ScanEvent::TotalFiles(_)))
                .count(),
            1
        );

        // One progress unit per file, one detection, correct terminal
        assert_eq!(progress_count(&events), 3);
        assert_eq!(detected_paths(&events), vec![bad]);
        match events.last().unwrap() {
            ScanEvent::Completed { scanned, detected } => {
                assert_eq!(*scanned, 3);
                assert_eq!(*detected, 1);
                assert_eq!(*scanned, progress_count(&events));
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        // Terminal is the end of the stream
        assert!(handle.events().recv().is_err());
    }

    #[test]
    fn test_scan_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);
        let root = temp_dir.path().join("empty");
        fs::create_dir(&root).unwrap();

        let handle = start_scan(root, store);
        let events = drain_events(&handle);

        assert!(events
            .iter()
            .any(|e| matches!(e, ScanEvent::TotalFiles(0))));
        assert_eq!(progress_count(&events), 0);
        assert!(detected_paths(&events).is_empty());
        assert!(matches!(
            events.last().unwrap(),
            ScanEvent::Completed {
                scanned: 0,
                detected: 0
            }
        ));
    }

    #[test]
    fn test_scan_clean_tree_detects_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);
        let root = temp_dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("one.txt"), "one").unwrap();
        fs::write(root.join("two.txt"), "two").unwrap();

        let handle = start_scan(root, store);
        let events = drain_events(&handle);

        assert!(detected_paths(&events).is_empty());
        assert!(matches!(
            events.last().unwrap(),
            ScanEvent::Completed {
                scanned: 2,
                detected: 0
            }
        ));
    }

    #[test]
    fn test_cancel_before_start_yields_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);
        let root = temp_dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();

        let handle = start_scan(root, store);
        handle.cancel();
        let events = drain_events(&handle);

        // The token may be observed during counting or scanning; either
        // way the terminal is Cancelled and nothing follows it
        assert!(matches!(events.last().unwrap(), ScanEvent::Cancelled(_)));
        assert_eq!(
            events.iter().filter(|e| e.is_terminal()).count(),
            1,
            "exactly one terminal event"
        );
        assert!(handle.events().recv().is_err());
    }

    #[test]
    fn test_cancel_mid_scan_stops_after_current_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);
        let root = temp_dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        for i in 0..3 {
            fs::write(root.join(format!("f{}.txt", i)), format!("{}", i)).unwrap();
        }

        // Hold an exclusive lock so the worker's first lookup parks on the
        // busy timeout, giving a deterministic window to cancel mid-scan.
        let blocker = store.connection().unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let handle = start_scan(root, store);

        // Counting does not touch the store, so TotalFiles still arrives
        loop {
            match handle.events().recv().unwrap() {
                ScanEvent::TotalFiles(n) => {
                    assert_eq!(n, 3);
                    break;
                }
                event => assert!(!event.is_terminal(), "unexpected terminal {:?}", event),
            }
        }

        // Worker is now (or soon) parked inside the first lookup
        std::thread::sleep(std::time::Duration::from_millis(200));
        handle.cancel();
        blocker.execute_batch("COMMIT;").unwrap();

        let events = drain_events(&handle);
        match events.last().unwrap() {
            ScanEvent::Cancelled(summary) => assert!(summary.contains("of 3")),
            other => panic!("expected Cancelled, got {:?}", other),
        }
        // The file in flight finished; nothing after it was processed
        assert_eq!(progress_count(&events), 1);
        assert!(handle.events().recv().is_err());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);
        let root = temp_dir.path().join("no_such_dir");

        let handle = start_scan(root, store);
        let events = drain_events(&handle);

        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        match events.last().unwrap() {
            ScanEvent::Fatal(reason) => assert!(reason.contains("scan root")),
            other => panic!("expected Fatal, got {:?}", other),
        }
        assert!(!events
            .iter()
            .any(|e| matches!(e, ScanEvent::TotalFiles(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdir_is_skipped_with_dir_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);
        let root = temp_dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("ok.txt"), "fine").unwrap();
        let locked = root.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("unseen.txt"), "hidden").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        if fs::read_dir(&locked).is_ok() {
            // Privileged user: mode bits don't bite, nothing to observe
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let handle = start_scan(root, store);
        let events = drain_events(&handle);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(events
            .iter()
            .any(|e| matches!(e, ScanEvent::DirError { path, .. } if *path == locked)));
        // Totals reflect only the accessible file
        assert!(events
            .iter()
            .any(|e| matches!(e, ScanEvent::TotalFiles(1))));
        assert!(matches!(
            events.last().unwrap(),
            ScanEvent::Completed {
                scanned: 1,
                detected: 0
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_file_error_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);
        let root = temp_dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("readable.txt"), "fine").unwrap();
        let locked = root.join("locked.bin");
        fs::write(&locked, "no read").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        if fs::File::open(&locked).is_ok() {
            return;
        }

        let handle = start_scan(root, store);
        let events = drain_events(&handle);

        assert!(events
            .iter()
            .any(|e| matches!(e, ScanEvent::FileError { path, .. } if *path == locked)));
        // The failed file still counts toward progress and the summary
        assert_eq!(progress_count(&events), 2);
        assert!(matches!(
            events.last().unwrap(),
            ScanEvent::Completed {
                scanned: 2,
                detected: 0
            }
        ));
    }

    #[test]
    fn test_detection_matches_current_store_state() {
        // Signatures inserted while a scan is possible are observed by
        // later lookups; here we just assert lookups see the state at
        // scan time, not at store-open time.
        let temp_dir = TempDir::new().unwrap();
        let store = setup_store(&temp_dir);
        let root = temp_dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        let target = root.join("late.bin");
        fs::write(&target, "added after open").unwrap();

        // Insert through a second, independent handle
        let other = SignatureDb::open(store.path()).unwrap();
        add_file(&other, &target).unwrap();

        let handle = start_scan(root, store);
        let events = drain_events(&handle);
        assert_eq!(detected_paths(&events), vec![target]);
    }
}
