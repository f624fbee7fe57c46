//! Pipeline stages.
//!
//! A stage is one step of a task's transformation: it receives an [`Asset`]
//! and returns the transformed asset or a [`StageError`]. A pipeline applies
//! its stages in order and stops at the first failure for that file only.

use crate::build::Asset;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a stage for a single file.
#[derive(Debug, Error)]
pub enum StageError {
    /// The input could not be parsed or compiled
    #[error("{stage}: {message}")]
    Transform { stage: String, message: String },
    /// The input was not valid UTF-8
    #[error("{stage}: input is not valid UTF-8")]
    Encoding { stage: String },
    /// An external program failed
    #[error("{stage}: {message}")]
    Command { stage: String, message: String },
    /// IO error while the stage read a dependency
    #[error("{stage}: {source}")]
    Io {
        stage: String,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub fn transform(stage: &str, message: impl Into<String>) -> Self {
        StageError::Transform { stage: stage.to_string(), message: message.into() }
    }

    pub fn command(stage: &str, message: impl Into<String>) -> Self {
        StageError::Command { stage: stage.to_string(), message: message.into() }
    }

    pub fn io(stage: &str, source: std::io::Error) -> Self {
        StageError::Io { stage: stage.to_string(), source }
    }

    pub fn encoding(stage: &str) -> Self {
        StageError::Encoding { stage: stage.to_string() }
    }
}

/// One transformation step.
pub trait Stage: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Transform a single asset.
    fn apply(&self, asset: Asset) -> Result<Asset, StageError>;
}

/// Ordered sequence of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append a stage only when `enabled`.
    pub fn stage_if(self, enabled: bool, stage: impl Stage + 'static) -> Self {
        if enabled {
            self.stage(stage)
        } else {
            self
        }
    }

    /// Names of the stages in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Push an asset through every stage in order.
    pub fn run(&self, asset: Asset) -> Result<Asset, StageError> {
        self.stages.iter().try_fold(asset, |asset, stage| {
            tracing::trace!(stage = stage.name(), file = %asset.display_name(), "applying stage");
            stage.apply(asset)
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}
