//! Build mode selection.

use std::env;

/// Environment variable that selects the build mode
pub const MODE_ENV_VAR: &str = "NODE_ENV";

/// Whether the build targets local development or a production deploy.
///
/// Development keeps source maps and readable output; production minifies
/// stylesheets and optimizes images. The mode is read once at startup and
/// carried in [`BuildContext`](crate::build::BuildContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    /// Read the mode from `NODE_ENV`.
    pub fn from_env() -> Self {
        Self::from_env_value(env::var(MODE_ENV_VAR).ok().as_deref())
    }

    /// `production` selects production; any other value (or none) selects
    /// development.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("production") => BuildMode::Production,
            _ => BuildMode::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}
