//! Progress reporting for backup operations.
//!
//! Provides visual feedback while the snapshot sync walks the tree and while
//! the archive is written.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;

/// Progress reporter for a backup run.
#[derive(Debug, Clone)]
pub struct BackupProgress {
    multi: Arc<MultiProgress>,
    sync_bar: Option<ProgressBar>,
    archive_bar: Option<ProgressBar>,
}

impl BackupProgress {
    /// Creates a new backup progress reporter.
    pub fn new() -> Self {
        Self {
            multi: Arc::new(MultiProgress::new()),
            sync_bar: None,
            archive_bar: None,
        }
    }

    /// Starts the sync phase spinner.
    pub fn start_sync(&mut self, message: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        self.sync_bar = Some(bar);
    }

    /// Updates the sync spinner message.
    pub fn update_sync(&self, message: &str) {
        if let Some(bar) = &self.sync_bar {
            bar.set_message(message.to_string());
        }
    }

    /// Finishes the sync phase.
    pub fn finish_sync(&self, message: &str) {
        if let Some(bar) = &self.sync_bar {
            bar.finish_with_message(message.to_string());
        }
    }

    /// Starts the archive phase with a known file count.
    pub fn start_archive(&mut self, total_files: u64, message: &str) {
        let bar = self.multi.add(ProgressBar::new(total_files));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%)")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(message.to_string());
        self.archive_bar = Some(bar);
    }

    /// Increments the archive progress by one file.
    pub fn inc_archive(&self) {
        if let Some(bar) = &self.archive_bar {
            bar.inc(1);
        }
    }

    /// Finishes the archive phase.
    pub fn finish_archive(&self, message: &str) {
        if let Some(bar) = &self.archive_bar {
            bar.finish_with_message(message.to_string());
        }
    }

    /// Clears all bars.
    pub fn finish_all(&self) {
        if let Some(bar) = &self.sync_bar {
            bar.finish_and_clear();
        }
        if let Some(bar) = &self.archive_bar {
            bar.finish_and_clear();
        }
    }
}

impl Default for BackupProgress {
    fn default() -> Self {
        Self::new()
    }
}
