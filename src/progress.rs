//! Terminal progress for the CLI
//!
//! [`ProgressObserver`] drives an indicatif bar from session notifications;
//! [`print_summary`] reports the final tallies.

use crate::entry::{Entry, EntryState, EntryTree};
use crate::observer::SessionObserver;
use crate::session::ExtractionOutcome;
use crate::util::format_size;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:>3}% {msg}";

pub struct ProgressObserver {
    bar: ProgressBar,
    completed: AtomicU64,
}

impl ProgressObserver {
    /// A hidden observer still tracks completions, it just draws nothing
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            completed: AtomicU64::new(0),
        }
    }

    /// Entries created at the destination so far
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Remove the bar once no further run follows
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Print a line above the bar
    pub fn println(&self, line: impl AsRef<str>) {
        if self.bar.is_hidden() {
            eprintln!("{}", line.as_ref());
        } else {
            self.bar.println(line.as_ref());
        }
    }
}

impl SessionObserver for ProgressObserver {
    fn update_entry_state(&self, entry: &Entry, state: EntryState) {
        match state {
            EntryState::BeginDecompression => {
                self.bar.set_message(format!("inflating {}", entry.path()));
            }
            EntryState::BeginUpload => {
                let path = if entry.path().is_empty() {
                    entry.name()
                } else {
                    entry.path()
                };
                self.bar.set_message(format!("writing {}", path));
            }
            EntryState::UploadError => {
                let reason = entry.message().unwrap_or("unknown error");
                self.println(format!("{} {}: {}", "✗".red(), entry.path(), reason));
            }
            _ => {}
        }
    }

    fn handle_session_progress(&self, current: u64, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(current);
    }

    fn update_ui_for_file_complete(&self, _entry: &Entry, _link: &str, _icon_link: Option<&str>) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    fn extraction_complete(&self) {
        self.bar.set_message("done");
    }

    fn extraction_canceled(&self) {
        self.bar.set_message("canceled".yellow().to_string());
    }
}

/// Final tallies of a tree
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub folders: u64,
    pub files: u64,
    pub bytes: u64,
    pub skipped: u64,
    pub failed: u64,
    pub pending_retry: u64,
    pub canceled: u64,
}

impl Summary {
    pub fn from_tree(tree: &EntryTree) -> Self {
        let mut summary = Summary::default();
        for entry in tree.entries() {
            match entry.state() {
                EntryState::UploadComplete if entry.is_directory() => summary.folders += 1,
                EntryState::UploadComplete => {
                    summary.files += 1;
                    summary.bytes += entry.uncompressed_size();
                }
                EntryState::Skipped => summary.skipped += 1,
                EntryState::UploadError | EntryState::DecompressionError => summary.failed += 1,
                EntryState::QueuedPendingRetry => summary.pending_retry += 1,
                EntryState::Canceled | EntryState::UploadAborted => summary.canceled += 1,
                _ => {}
            }
        }
        summary
    }
}

pub fn print_summary(summary: &Summary, outcome: ExtractionOutcome, elapsed: Duration) {
    let title = match (outcome, summary.failed + summary.pending_retry) {
        (ExtractionOutcome::Canceled, _) => "Extraction canceled".yellow().bold(),
        (_, 0) => "Extraction complete".green().bold(),
        _ => "Extraction finished with errors".red().bold(),
    };

    println!();
    println!("{}", title);
    println!("{}", "─".repeat(50).as_str().dimmed());
    println!("  {} {}", "Folders:".bold(), summary.folders);
    println!(
        "  {} {} ({})",
        "Files:".bold(),
        summary.files,
        format_size(summary.bytes)
    );
    if summary.skipped > 0 {
        println!("  {} {}", "Skipped:".bold(), summary.skipped);
    }
    if summary.failed > 0 {
        println!("  {} {}", "Failed:".red().bold(), summary.failed);
    }
    if summary.pending_retry > 0 {
        println!(
            "  {} {}",
            "Not attempted:".yellow().bold(),
            summary.pending_retry
        );
    }
    if summary.canceled > 0 {
        println!("  {} {}", "Canceled:".yellow().bold(), summary.canceled);
    }
    println!("  {} {:.1}s", "Duration:".bold(), elapsed.as_secs_f64());
    println!();
}
