//! Composite orchestration.
//!
//! Runs tasks on the tokio runtime: each task's file work happens on a
//! blocking worker, groups run their members concurrently, and the two
//! composites (`default` and `production`) sequence groups, clearing, watch
//! mode and the dev server.

use crate::build::{clear_output, BuildContext, ClearError, TaskError, TaskReport};
use crate::server::{self, ServerError};
use crate::tasks::{BuildTask, TaskSet};
use crate::watch::{self, WatchError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch as signal;
use tokio::task::JoinSet;

/// Members of the initial build pass of `default`
pub const DEFAULT_GROUP: [BuildTask; 6] = [
    BuildTask::Templates,
    BuildTask::Icons,
    BuildTask::Styles,
    BuildTask::Scripts,
    BuildTask::Images,
    BuildTask::Copy,
];

/// Members of the `production` build pass
pub const PRODUCTION_GROUP: [BuildTask; 4] =
    [BuildTask::Templates, BuildTask::Styles, BuildTask::Scripts, BuildTask::Images];

/// Error that stops a composite.
#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error(transparent)]
    Clear(#[from] ClearError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("{0} did not complete: {1}")]
    Join(&'static str, String),
}

/// Outcome of a concurrent group.
#[derive(Debug, Default)]
pub struct GroupReport {
    /// Reports of members that ran, in group order
    pub reports: Vec<TaskReport>,
    /// Members that failed as a whole
    pub errors: Vec<TaskError>,
}

impl GroupReport {
    /// Every member ran and every file succeeded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.reports.iter().all(TaskReport::is_success)
    }

    pub fn report(&self, task: BuildTask) -> Option<&TaskReport> {
        self.reports.iter().find(|r| r.task == task.as_str())
    }
}

/// Shared handle for running tasks. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    ctx: Arc<BuildContext>,
    tasks: Arc<TaskSet>,
}

impl Orchestrator {
    pub fn new(ctx: BuildContext) -> Self {
        let tasks = TaskSet::from_context(&ctx);
        Self { ctx: Arc::new(ctx), tasks: Arc::new(tasks) }
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    /// Run one task on a blocking worker and log its outcome.
    async fn run_blocking(&self, task: BuildTask) -> Result<TaskReport, TaskError> {
        tracing::info!("Starting '{}'...", task);
        let tasks = Arc::clone(&self.tasks);
        let result = tokio::task::spawn_blocking(move || tasks.run(task))
            .await
            .unwrap_or_else(|e| {
                Err(TaskError::Join { task: task.to_string(), message: e.to_string() })
            });

        match &result {
            Ok(report) if report.is_success() => tracing::info!("{}", report.summary()),
            Ok(report) => tracing::error!("{}", report.summary()),
            Err(e) => tracing::error!("{}", e),
        }
        result
    }

    /// Run a single task.
    ///
    /// `styles` first builds the icon sprite when the sprite or its
    /// stylesheet fragment is missing.
    pub async fn run_task(&self, task: BuildTask) -> Result<TaskReport, TaskError> {
        if task == BuildTask::Styles && !self.tasks.sprite().artifacts_exist() {
            tracing::info!("sprite artifacts missing, running '{}' first", BuildTask::Icons);
            // The styles run below reports any resulting import failure
            let _ = self.run_blocking(BuildTask::Icons).await;
        }
        self.run_blocking(task).await
    }

    /// Run tasks concurrently and wait for all of them.
    ///
    /// A failing member never stops its siblings. When the group holds both
    /// `icons` and `styles`, `styles` starts once `icons` has finished.
    pub async fn run_group(&self, group: &[BuildTask]) -> GroupReport {
        let ordered = group.contains(&BuildTask::Icons) && group.contains(&BuildTask::Styles);
        let (icons_done, icons_rx) = signal::channel(false);
        let mut icons_done = Some(icons_done);

        let mut set = JoinSet::new();
        for (index, &task) in group.iter().enumerate() {
            let this = self.clone();
            let notify = if ordered && task == BuildTask::Icons { icons_done.take() } else { None };
            let mut wait = (ordered && task == BuildTask::Styles).then(|| icons_rx.clone());

            set.spawn(async move {
                let result = match wait.as_mut() {
                    Some(rx) => {
                        // A closed channel means icons is gone; styles runs regardless
                        let _ = rx.wait_for(|done| *done).await;
                        this.run_blocking(task).await
                    }
                    None => this.run_task(task).await,
                };
                if let Some(tx) = notify {
                    let _ = tx.send(true);
                }
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<TaskReport, TaskError>>> =
            group.iter().map(|_| None).collect();
        let mut report = GroupReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => report
                    .errors
                    .push(TaskError::Join { task: "group member".to_string(), message: e.to_string() }),
            }
        }

        for result in slots.into_iter().flatten() {
            match result {
                Ok(task_report) => report.reports.push(task_report),
                Err(e) => report.errors.push(e),
            }
        }
        report
    }

    /// Delete the output root.
    pub async fn clear(&self) -> Result<(), OrchestrateError> {
        tracing::info!("Starting 'clear'...");
        let ctx = Arc::clone(&self.ctx);
        let cleared = tokio::task::spawn_blocking(move || clear_output(&ctx))
            .await
            .map_err(|e| OrchestrateError::Join("clear", e.to_string()))??;
        tracing::info!("'clear' finished: removed {}", cleared.display());
        Ok(())
    }

    /// Clear the output root, then run the production group.
    ///
    /// A clear failure aborts before any task starts.
    pub async fn run_production(&self) -> Result<GroupReport, OrchestrateError> {
        self.clear().await?;
        Ok(self.run_group(&PRODUCTION_GROUP).await)
    }

    /// Full build pass, then watch mode and the dev server until the
    /// process is terminated.
    pub async fn run_default(&self) -> Result<(), OrchestrateError> {
        let report = self.run_group(&DEFAULT_GROUP).await;
        if !report.is_success() {
            tracing::warn!("initial build finished with errors; watching for fixes");
        }
        self.watch_and_serve().await
    }

    /// Watch mode until the process is terminated.
    pub async fn run_watch(&self) -> Result<(), OrchestrateError> {
        watch::watch(self.clone()).await.map_err(OrchestrateError::from)
    }

    /// Dev server until the process is terminated.
    pub async fn run_server(&self) -> Result<(), OrchestrateError> {
        server::serve(Arc::clone(&self.ctx)).await.map_err(OrchestrateError::from)
    }

    /// Watch mode and the dev server side by side.
    pub async fn watch_and_serve(&self) -> Result<(), OrchestrateError> {
        tokio::try_join!(self.run_watch(), self.run_server())?;
        Ok(())
    }
}
