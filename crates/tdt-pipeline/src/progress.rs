//! Progress reporting for batch file processing.

use tracing::info;

/// Counters of one window run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionProgress {
    /// Input files found
    pub files_total: u64,
    /// Input files handled, failed ones included
    pub files_processed: u64,
    /// Files that could not be read
    pub files_failed: u64,
    /// Files outside the window
    pub files_out_of_scope: u64,
}

impl SessionProgress {
    /// Start counting over `files_total` files.
    pub fn new(files_total: u64) -> Self {
        Self {
            files_total,
            ..Default::default()
        }
    }

    /// Record a file read successfully.
    pub fn record_loaded(&mut self) {
        self.files_processed += 1;
    }

    /// Record a file that failed.
    pub fn record_failed(&mut self) {
        self.files_failed += 1;
        self.files_processed += 1;
    }

    /// Record a file dated outside the window.
    pub fn record_out_of_scope(&mut self) {
        self.files_out_of_scope += 1;
        self.files_processed += 1;
    }

    /// Whether every file was handled.
    pub fn is_complete(&self) -> bool {
        self.files_processed >= self.files_total
    }
}

/// Receives progress updates during traversal.
pub trait ProgressCallback: Send {
    /// Called after each file.
    fn on_progress(&self, progress: &SessionProgress);
}

/// A no-op progress callback for when progress reporting isn't needed.
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _progress: &SessionProgress) {}
}

/// A callback that logs progress at info level every `every` files.
pub struct LoggingProgressCallback {
    every: u64,
}

impl LoggingProgressCallback {
    /// Create a new logging progress callback.
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1) as u64,
        }
    }
}

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, progress: &SessionProgress) {
        if progress.files_processed % self.every == 0 || progress.is_complete() {
            info!(
                processed = progress.files_processed,
                total = progress.files_total,
                failed = progress.files_failed,
                "Session progress"
            );
        }
    }
}
