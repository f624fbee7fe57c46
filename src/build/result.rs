//! Build result types.
//!
//! A task never aborts on a single bad file: each file gets a
//! [`FileOutcome`], and the outcomes are collected into a [`TaskReport`].

use std::path::PathBuf;
use std::time::Duration;

/// Status of a single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Processed and written
    Written,
    /// Unchanged since the previous run
    Skipped,
    /// A stage or the write failed
    Failed(String),
}

impl FileStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, FileStatus::Written | FileStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, FileStatus::Failed(_))
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Written => write!(f, "written"),
            FileStatus::Skipped => write!(f, "skipped"),
            FileStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of processing one source file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// Source file that was processed
    pub source: PathBuf,
    pub status: FileStatus,
    /// Artifacts written for this file
    pub outputs: Vec<PathBuf>,
}

impl FileOutcome {
    pub fn written(source: PathBuf, outputs: Vec<PathBuf>) -> Self {
        Self { source, status: FileStatus::Written, outputs }
    }

    pub fn skipped(source: PathBuf) -> Self {
        Self { source, status: FileStatus::Skipped, outputs: vec![] }
    }

    pub fn failed(source: PathBuf, error: impl Into<String>) -> Self {
        Self { source, status: FileStatus::Failed(error.into()), outputs: vec![] }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of one task run.
#[derive(Debug, Default)]
pub struct TaskReport {
    /// Task name
    pub task: String,
    /// One outcome per source file
    pub files: Vec<FileOutcome>,
    /// Artifacts not tied to a single source (sprite sheet, fragment)
    pub artifacts: Vec<PathBuf>,
    /// Total duration
    pub duration: Duration,
}

impl TaskReport {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into(), ..Self::default() }
    }

    /// Add a file outcome.
    pub fn add(&mut self, outcome: FileOutcome) {
        self.files.push(outcome);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn written_count(&self) -> usize {
        self.files.iter().filter(|r| matches!(r.status, FileStatus::Written)).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.files.iter().filter(|r| matches!(r.status, FileStatus::Skipped)).count()
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if every file succeeded.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Failed file outcomes.
    pub fn failures(&self) -> Vec<&FileOutcome> {
        self.files.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// One-line summary, followed by one line per failure.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let written = self.written_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();

        if failed > 0 {
            lines.push(format!(
                "'{}' finished with errors: {} written, {} skipped, {} failed",
                self.task, written, skipped, failed
            ));
            for outcome in self.failures() {
                lines.push(format!("  - {}: {}", outcome.source.display(), outcome.status));
            }
        } else {
            lines.push(format!(
                "'{}' finished: {} written, {} skipped in {}",
                self.task,
                written,
                skipped,
                format_duration(self.duration)
            ));
        }

        lines.join("\n")
    }
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
