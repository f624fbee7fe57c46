//! Build pipeline module for sitepipe
//!
//! Provides the core of every transform task: the path registry and build
//! mode, source discovery, the stage pipeline, and per-file results.
//!
//! # Overview
//!
//! A task is executed in three steps:
//! - **Discovery**: resolve the task's source globs below the source root
//! - **Transformation**: push every file through the task's [`Pipeline`]
//! - **Output**: write each result below the task destination, mirroring the
//!   path relative to the glob base
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{BuildContext, Pipeline, TaskDescriptor, TransformTask};
//! use sitepipe::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let task = TransformTask::new(TaskDescriptor::new(
//!     "copy",
//!     context.app_dir(),
//!     vec!["common/fonts/**/*".to_string()],
//!     context.dist_path("assets/fonts".as_ref()),
//! ));
//!
//! let report = task.run()?;
//! println!("{}", report.summary());
//! ```

pub mod asset;
pub mod clear;
pub mod context;
pub mod discovery;
pub mod mode;
pub mod result;
pub mod stage;
pub mod task;

pub use asset::*;
pub use clear::*;
pub use context::*;
pub use discovery::*;
pub use mode::*;
pub use result::*;
pub use stage::*;
pub use task::*;
