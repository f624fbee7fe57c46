//! Output renaming.

use crate::build::{Asset, Stage, StageError};

/// Replaces the output extension, e.g. `.pug` → `.html`.
#[derive(Debug, Clone)]
pub struct Rename {
    extension: String,
}

impl Rename {
    pub fn extension(extension: impl Into<String>) -> Self {
        Self { extension: extension.into() }
    }
}

impl Stage for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, StageError> {
        Ok(asset.with_extension(&self.extension))
    }
}
