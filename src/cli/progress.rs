//! Progress bar and summary reporting for the terminal.

use std::sync::Mutex;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{DownloadProgress, SessionSummary, format_bytes, format_duration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a progress bar for the downloads of one page.
pub fn make_page_bar(tracks: usize, page: u32) -> ProgressBar {
    let bar = ProgressBar::new(tracks as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} - {msg}")
            .expect("progress template is valid")
            .progress_chars("━━╌"),
    );
    bar.set_message(format!("page {page}"));
    bar
}

/// One bar per page, replaced when the next page starts.
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

impl DownloadProgress for BarProgress {
    fn on_page_start(&self, page: u32, tracks: usize) {
        let bar = make_page_bar(tracks, page);
        let mut guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(old) = guard.replace(bar) {
            old.finish_and_clear();
        }
    }

    fn on_track(&self, done: usize) {
        self.with_bar(|bar| bar.set_position(done as u64));
    }

    fn on_page_complete(&self, page: u32, downloaded: usize) {
        self.with_bar(|bar| {
            bar.finish_and_clear();
            bar.println(format!("Page {page}: started {downloaded} download(s)"));
        });
    }
}

/// Lines of the end-of-session report.
pub fn summary_lines(summary: &SessionSummary) -> Vec<String> {
    vec![
        format!("  Files downloaded:  {}", summary.tracks),
        format!("  Disk consumed:     {}", format_bytes(summary.bytes_consumed)),
        format!("  Total time:        {}", format_duration(summary.elapsed)),
    ]
}

/// Prints the end-of-session report.
pub fn print_summary(summary: &SessionSummary) {
    println!("\n{SEPARATOR}");
    println!("{}", style(summary.site).cyan().bold());
    println!("{SEPARATOR}");
    for line in summary_lines(summary) {
        println!("{line}");
    }
    println!("{SEPARATOR}\n");
}
