//! Task dispatch

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{Cli, TaskName, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildMode};
use crate::config::loader::{check, find_config, merge_cli_overrides, project_root};
use crate::config::{load_config, CliOverrides, ConfigError, SiteConfig};
use crate::orchestrate::{OrchestrateError, Orchestrator};
use crate::tasks::BuildTask;

/// Load the configuration and locate the project root.
///
/// The project root is the directory holding the config file, or the
/// current directory when there is none.
fn load(cli: &Cli) -> Result<(SiteConfig, PathBuf), ConfigError> {
    let config_path = cli.config.clone().or_else(find_config);
    let mut config = match &config_path {
        Some(path) => {
            tracing::debug!("Using config: {}", path.display());
            load_config(Some(path))?
        }
        None => {
            tracing::debug!("No sitepipe.toml found, using defaults");
            SiteConfig::default()
        }
    };

    let overrides =
        CliOverrides { app: cli.app.clone(), dist: cli.dist.clone(), port: cli.port };
    merge_cli_overrides(&mut config, &overrides);
    check(&config)?;

    let root = match config_path.as_deref().and_then(project_root) {
        Some(dir) if dir != Path::new("") => dir.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    Ok((config, root))
}

fn build_task(task: TaskName) -> Option<BuildTask> {
    match task {
        TaskName::Templates => Some(BuildTask::Templates),
        TaskName::Styles => Some(BuildTask::Styles),
        TaskName::Scripts => Some(BuildTask::Scripts),
        TaskName::Images => Some(BuildTask::Images),
        TaskName::Copy => Some(BuildTask::Copy),
        TaskName::Icons => Some(BuildTask::Icons),
        TaskName::Clear
        | TaskName::Server
        | TaskName::Watch
        | TaskName::Default
        | TaskName::Production => None,
    }
}

fn exit_code(result: Result<bool, OrchestrateError>) -> ExitCode {
    match result {
        Ok(true) => ExitCode::from(EXIT_SUCCESS),
        Ok(false) => ExitCode::from(EXIT_ERROR),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the task named on the command line
pub async fn run_task(cli: &Cli) -> ExitCode {
    let (config, root) = match load(cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let mode = BuildMode::from_env();
    tracing::debug!(mode = %mode, root = %root.display(), "starting sitepipe");
    let orchestrator = Orchestrator::new(BuildContext::new(config, root).with_mode(mode));

    if let Some(task) = build_task(cli.task) {
        let result = orchestrator.run_task(task).await;
        return exit_code(result.map(|report| report.is_success()).map_err(OrchestrateError::from));
    }

    let result = match cli.task {
        TaskName::Clear => orchestrator.clear().await.map(|()| true),
        TaskName::Production => orchestrator.run_production().await.map(|group| group.is_success()),
        TaskName::Server => orchestrator.run_server().await.map(|()| true),
        TaskName::Watch => orchestrator.run_watch().await.map(|()| true),
        _ => orchestrator.run_default().await.map(|()| true),
    };
    exit_code(result)
}
