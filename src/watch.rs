//! Watch mode for automatic rebuilds on file changes
//!
//! Maps debounced file system events below the source root to task runs.
//! Every watched task owns a worker; a change arriving while that task is
//! already running queues exactly one follow-up run.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::build::TaskReport;
use crate::config::SiteConfig;
use crate::orchestrate::Orchestrator;
use crate::tasks::BuildTask;

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// A trigger glob is invalid
    InvalidTrigger(String, glob::PatternError),
    /// The event channel closed
    ChannelClosed,
    /// Source directory not found
    SourceNotFound(PathBuf),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::InvalidTrigger(pattern, e) => {
                write!(f, "Invalid watch pattern '{}': {}", pattern, e)
            }
            WatchError::ChannelClosed => write!(f, "Watch event channel closed"),
            WatchError::SourceNotFound(path) => {
                write!(f, "Source directory not found: {}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {}

/// Tracks files with errors across runs of one task for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files that had errors in the previous run
    files_with_errors: HashSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a new report, returns list of fixed files
    pub fn update(&mut self, report: &TaskReport) -> Vec<PathBuf> {
        let current_error_files: HashSet<PathBuf> =
            report.failures().into_iter().map(|outcome| outcome.source.clone()).collect();

        // Find files that had errors before but don't now
        let mut fixed: Vec<PathBuf> =
            self.files_with_errors.difference(&current_error_files).cloned().collect();
        fixed.sort();

        self.files_with_errors = current_error_files;
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    /// Get the number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.len()
    }
}

/// Source globs whose changes re-run a task.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub task: BuildTask,
    triggers: Vec<glob::Pattern>,
}

impl WatchBinding {
    /// Build a binding from globs relative to the source root.
    pub fn new(task: BuildTask, patterns: &[String]) -> Result<Self, WatchError> {
        let triggers = patterns
            .iter()
            .map(|p| glob::Pattern::new(p).map_err(|e| WatchError::InvalidTrigger(p.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { task, triggers })
    }

    /// Whether a path relative to the source root triggers this binding.
    pub fn matches(&self, relative: &Path) -> bool {
        let options = glob::MatchOptions { require_literal_separator: true, ..Default::default() };
        self.triggers.iter().any(|t| t.matches_path_with(relative, options))
    }

    pub fn patterns(&self) -> Vec<&str> {
        self.triggers.iter().map(glob::Pattern::as_str).collect()
    }
}

/// Bindings watched by `default` and `watch`.
pub fn default_bindings(config: &SiteConfig) -> Result<Vec<WatchBinding>, WatchError> {
    let template_glob = format!("**/*.{}", template_extension(config));
    Ok(vec![
        WatchBinding::new(BuildTask::Templates, &[template_glob])?,
        WatchBinding::new(BuildTask::Styles, &["**/*.css".to_string()])?,
        WatchBinding::new(BuildTask::Scripts, &["**/*.js".to_string()])?,
        WatchBinding::new(BuildTask::Images, &config.images.sources)?,
        WatchBinding::new(BuildTask::Icons, &config.icons.sources)?,
        WatchBinding::new(BuildTask::Copy, &config.fonts.sources)?,
    ])
}

/// Source extension of page templates, taken from the first template glob.
fn template_extension(config: &SiteConfig) -> String {
    config
        .templates
        .sources
        .first()
        .and_then(|p| Path::new(p).extension())
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "pug".to_string())
}

/// Tasks triggered by a changed path, in binding order.
pub fn bindings_for(bindings: &[WatchBinding], relative: &Path) -> Vec<BuildTask> {
    let mut tasks = Vec::new();
    for binding in bindings.iter().filter(|b| b.matches(relative)) {
        if !tasks.contains(&binding.task) {
            tasks.push(binding.task);
        }
    }
    tasks
}

/// Runs one task per received trigger until the trigger side closes.
async fn task_worker(orchestrator: Orchestrator, task: BuildTask, mut triggers: mpsc::Receiver<()>) {
    let mut tracker = ErrorTracker::new();
    while triggers.recv().await.is_some() {
        if let Ok(report) = orchestrator.run_task(task).await {
            for fixed in tracker.update(&report) {
                tracing::info!(task = %task, "Fixed: {}", fixed.display());
            }
        }
    }
}

/// Queue a run; a run already queued absorbs the trigger.
fn trigger(sender: &mpsc::Sender<()>, task: BuildTask) {
    match sender.try_send(()) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(())) => {
            tracing::debug!(task = %task, "run already queued");
        }
        Err(mpsc::error::TrySendError::Closed(())) => {
            tracing::warn!(task = %task, "task worker stopped");
        }
    }
}

/// Watch the source root and re-run bound tasks on change.
///
/// Runs until the process is terminated. Task failures are logged and never
/// stop the watcher.
pub async fn watch(orchestrator: Orchestrator) -> Result<(), WatchError> {
    let ctx = orchestrator.context();
    let app_dir = ctx.app_dir();
    if !app_dir.is_dir() {
        return Err(WatchError::SourceNotFound(app_dir));
    }
    // Relative paths are computed against the canonical root, as reported by notify
    let root = app_dir.canonicalize().unwrap_or_else(|_| app_dir.clone());
    let bindings = default_bindings(ctx.config())?;

    let (tx, mut events) = mpsc::unbounded_channel::<DebounceEventResult>();
    let debounce = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
        let _ = tx.send(result);
    })
    .map_err(WatchError::WatcherInit)?;
    debouncer.watcher().watch(&app_dir, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;

    let mut workers: BTreeMap<BuildTask, mpsc::Sender<()>> = BTreeMap::new();
    for binding in &bindings {
        workers.entry(binding.task).or_insert_with(|| {
            let (sender, receiver) = mpsc::channel(1);
            tokio::spawn(task_worker(orchestrator.clone(), binding.task, receiver));
            sender
        });
    }

    tracing::info!("Watching {} for changes...", app_dir.display());

    while let Some(result) = events.recv().await {
        match result {
            Ok(changes) => {
                let mut due = BTreeSet::new();
                for change in changes.iter().filter(|c| matches!(c.kind, DebouncedEventKind::Any)) {
                    let Some(relative) =
                        change.path.strip_prefix(&root).or_else(|_| change.path.strip_prefix(&app_dir)).ok()
                    else {
                        continue;
                    };
                    for task in bindings_for(&bindings, relative) {
                        tracing::info!(task = %task, "Changed: {}", relative.display());
                        due.insert(task);
                    }
                }
                for task in due {
                    if let Some(sender) = workers.get(&task) {
                        trigger(sender, task);
                    }
                }
            }
            Err(error) => {
                // Watch error (non-fatal) - log but continue watching
                tracing::warn!("Watch error: {:?}; continuing to watch", error);
            }
        }
    }

    Err(WatchError::ChannelClosed)
}
