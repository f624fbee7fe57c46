//! Build context containing configuration and paths for a build.

use crate::build::BuildMode;
use crate::config::SiteConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration, roots and mode for a build.
///
/// This is the path registry every task resolves its directories through.
/// It is created once at startup and shared read-only by all tasks.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: SiteConfig,
    /// Project root directory (where sitepipe.toml is located)
    project_root: PathBuf,
    /// Development or production
    mode: BuildMode,
}

impl BuildContext {
    /// Create a new build context in development mode.
    pub fn new(config: SiteConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, mode: BuildMode::Development }
    }

    /// Set the build mode.
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Source root (resolved against the project root).
    pub fn app_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.paths.app)
    }

    /// Output root (resolved against the project root).
    pub fn dist_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.paths.dist)
    }

    /// Resolve a path inside the source root.
    pub fn app_path(&self, relative: &Path) -> PathBuf {
        self.app_dir().join(relative)
    }

    /// Resolve a path inside the output root.
    pub fn dist_path(&self, relative: &Path) -> PathBuf {
        self.dist_dir().join(relative)
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
