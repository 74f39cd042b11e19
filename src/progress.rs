use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for the counting phase, where the total is still unknown.
pub fn counting_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message("Counting files...");
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Determinate bar for the scanning phase; the message carries the running
/// detection count.
pub fn scan_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    pb.set_message("· 0 detected");
    pb
}

pub fn set_detected(pb: &ProgressBar, detected: u64) {
    pb.set_message(format!("· {} detected", detected));
}

pub fn finish_and_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
