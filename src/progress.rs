//! Progress reporting for the tree differ
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::changes::ChangeCounts;
use crate::walker::DiffSummary;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Progress reporter that displays diff status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let spinner = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(spinner);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, stats: &DiffSummary, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            stats.dirs_listed as f64 / secs
        } else {
            0.0
        };

        let msg = format!(
            "Dirs: {} | Captured: {} | Pruned: {} | Rate: {:.0} dirs/s",
            format_number(stats.dirs_listed),
            format_number(stats.entries_captured),
            format_number(stats.pruned),
            rate,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the diff results to stderr
pub fn print_summary(
    stats: &DiffSummary,
    counts: &ChangeCounts,
    changed_bytes: u64,
    duration: Duration,
) {
    let duration_secs = duration.as_secs_f64();

    eprintln!();
    eprintln!("{}", style("Diff Complete").green().bold());
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Added:").bold(), format_number(counts.added));
    eprintln!("  {} {}", style("Modified:").bold(), format_number(counts.modified));
    eprintln!("  {} {}", style("Deleted:").bold(), format_number(counts.deleted));
    eprintln!("  {} {}", style("New data:").bold(), format_size(changed_bytes, BINARY));
    eprintln!(
        "  {} {} listed, {} pruned",
        style("Directories:").bold(),
        format_number(stats.dirs_listed),
        format_number(stats.pruned)
    );
    eprintln!("  {} {:.2}s", style("Duration:").bold(), duration_secs);
    if stats.transient_absences > 0 {
        eprintln!(
            "  {} {}",
            style("Vanished:").yellow().bold(),
            format_number(stats.transient_absences)
        );
    }
    eprintln!();
}

/// Print a header at the start of the diff to stderr
pub fn print_header(old: &Path, new: &Path, schedule: &str) {
    eprintln!();
    eprintln!("{} {}", style("layer-diff").cyan().bold(), env!("CARGO_PKG_VERSION"));
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Old:").bold(), old.display());
    eprintln!("  {} {}", style("New:").bold(), new.display());
    eprintln!("  {} {}", style("Schedule:").bold(), schedule);
    eprintln!();
}
