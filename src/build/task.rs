//! Transform tasks.
//!
//! A [`TaskDescriptor`] names a set of source globs, an ordered
//! [`Pipeline`] and a destination. [`TransformTask`] runs it: every matched
//! file goes through the pipeline independently and lands under the
//! destination at its path relative to the glob base.

use crate::build::{discover_all, Asset, DiscoveryError, FileOutcome, Pipeline, SourceFile, TaskReport};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Instant, SystemTime};
use thiserror::Error;

/// Task-level failure. Per-file failures are reported in the [`TaskReport`]
/// instead.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Source globs could not be resolved
    #[error("task '{task}': {source}")]
    Discovery {
        task: String,
        #[source]
        source: DiscoveryError,
    },
    /// The source root does not exist
    #[error("task '{task}': source directory not found: {}", path.display())]
    MissingSource { task: String, path: PathBuf },
    /// A task-level input could not be read
    #[error("task '{task}': cannot read {}: {source}", path.display())]
    Read {
        task: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A directory or task-level artifact could not be written
    #[error("task '{task}': cannot write {}: {source}", path.display())]
    Write {
        task: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The blocking worker running the task did not complete
    #[error("task '{task}' did not complete: {message}")]
    Join { task: String, message: String },
}

/// Static description of a transform task.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    /// Task name
    pub name: String,
    /// Directory the globs are resolved against
    pub source_root: PathBuf,
    /// Source globs
    pub sources: Vec<String>,
    /// Stages applied to every file
    pub pipeline: Pipeline,
    /// Output directory
    pub destination: PathBuf,
    /// Only reprocess files modified since the last successful run
    pub incremental: bool,
}

impl TaskDescriptor {
    pub fn new(
        name: impl Into<String>,
        source_root: impl Into<PathBuf>,
        sources: Vec<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source_root: source_root.into(),
            sources,
            pipeline: Pipeline::new(),
            destination: destination.into(),
            incremental: false,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }
}

/// Runnable transform task.
///
/// Holds the time of the last successful run for incremental descriptors;
/// everything else is immutable.
#[derive(Debug)]
pub struct TransformTask {
    descriptor: TaskDescriptor,
    last_run: Mutex<Option<SystemTime>>,
}

impl TransformTask {
    pub fn new(descriptor: TaskDescriptor) -> Self {
        Self { descriptor, last_run: Mutex::new(None) }
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Time the previous successful run started, if any.
    pub fn last_run(&self) -> Option<SystemTime> {
        *self.last_run.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run the task once.
    ///
    /// Blocks while files are processed on the rayon pool.
    pub fn run(&self) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        let started_at = SystemTime::now();
        let d = &self.descriptor;

        if !d.source_root.is_dir() {
            return Err(TaskError::MissingSource {
                task: d.name.clone(),
                path: d.source_root.clone(),
            });
        }

        let files = discover_all(&d.source_root, &d.sources)
            .map_err(|source| TaskError::Discovery { task: d.name.clone(), source })?;

        fs::create_dir_all(&d.destination).map_err(|source| TaskError::Write {
            task: d.name.clone(),
            path: d.destination.clone(),
            source,
        })?;

        let since = if d.incremental { self.last_run() } else { None };
        tracing::debug!(
            task = %d.name,
            files = files.len(),
            stages = ?d.pipeline,
            incremental = since.is_some(),
            "processing sources"
        );

        let outcomes: Vec<FileOutcome> =
            files.par_iter().map(|file| self.process_file(file, since)).collect();

        let mut report = TaskReport::new(d.name.clone());
        for outcome in outcomes {
            if let crate::build::FileStatus::Failed(ref message) = outcome.status {
                tracing::warn!(task = %d.name, file = %outcome.source.display(), "{}", message);
            }
            report.add(outcome);
        }

        if report.is_success() && d.incremental {
            *self.last_run.lock().unwrap_or_else(|e| e.into_inner()) = Some(started_at);
        }

        Ok(report.with_duration(start.elapsed()))
    }

    /// Push one file through the pipeline and write the result.
    fn process_file(&self, file: &SourceFile, since: Option<SystemTime>) -> FileOutcome {
        if let Some(since) = since {
            if !modified_since(&file.path, since) {
                return FileOutcome::skipped(file.path.clone());
            }
        }

        let asset = match Asset::read(&file.path, &file.relative) {
            Ok(asset) => asset,
            Err(e) => return FileOutcome::failed(file.path.clone(), format!("read failed: {}", e)),
        };

        let asset = match self.descriptor.pipeline.run(asset) {
            Ok(asset) => asset,
            Err(e) => return FileOutcome::failed(file.path.clone(), e.to_string()),
        };

        match write_asset(&self.descriptor.destination, &asset) {
            Ok(output) => FileOutcome::written(file.path.clone(), vec![output]),
            Err(e) => FileOutcome::failed(file.path.clone(), format!("write failed: {}", e)),
        }
    }
}

/// Files whose modification time cannot be read count as modified.
fn modified_since(path: &Path, since: SystemTime) -> bool {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified >= since,
        Err(_) => true,
    }
}

/// Write an asset below `destination`, creating directories as needed.
pub fn write_asset(destination: &Path, asset: &Asset) -> std::io::Result<PathBuf> {
    let output = destination.join(&asset.relative);
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &asset.contents)?;
    Ok(output)
}
