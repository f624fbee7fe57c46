//! Command-line interface implementation
//!
//! Parses the task name and global options, sets up logging, and dispatches
//! to the task runner on a multi-threaded tokio runtime.

mod run;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Environment variable holding the log filter
pub const LOG_ENV_VAR: &str = "SITEPIPE_LOG";

/// Tasks invokable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskName {
    /// Delete the output root
    Clear,
    /// Compile page templates to HTML
    Templates,
    /// Compile the entry stylesheets
    Styles,
    /// Bundle the entry scripts
    Scripts,
    /// Copy images, optimized in production
    Images,
    /// Copy fonts
    Copy,
    /// Build the icon sprite and its stylesheet fragment
    Icons,
    /// Serve the output root with live reload
    Server,
    /// Re-run tasks when sources change
    Watch,
    /// Full build, then watch and serve
    Default,
    /// Clear, then a full production build
    Production,
}

/// Sitepipe - static site asset pipeline
#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Sitepipe - build templates, styles, scripts, images and icons for a static site")]
#[command(version)]
pub struct Cli {
    /// Task to run
    #[arg(value_enum, default_value = "default")]
    pub task: TaskName,

    /// Config file (default: sitepipe.toml found by walking up from the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the source root
    #[arg(long)]
    pub app: Option<PathBuf>,

    /// Override the output root
    #[arg(long)]
    pub dist: Option<PathBuf>,

    /// Override the dev server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Show debug output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Install the tracing subscriber.
///
/// `SITEPIPE_LOG` takes precedence; otherwise `info`, or `debug` with
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "sitepipe=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    runtime.block_on(run::run_task(&cli))
}
