//! A single file flowing through a task pipeline.

use std::path::{Path, PathBuf};

/// Source map collected while a stylesheet is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMapState {
    /// Source names, relative to the entry's directory
    pub sources: Vec<String>,
    /// Original contents, index-aligned with `sources`
    pub contents: Vec<String>,
    /// Base64 VLQ mappings from the output back to `sources`
    pub mappings: String,
}

impl SourceMapState {
    pub fn add_source(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.sources.push(name.into());
        self.contents.push(content.into());
    }

    /// Whether any output position maps back to a source.
    pub fn has_mappings(&self) -> bool {
        !self.mappings.is_empty()
    }
}

/// One file in a pipeline.
///
/// `relative` starts as the path of the source below its glob base and is
/// where the result lands below the task destination; stages may rename it.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Absolute path of the file that was read
    pub source: PathBuf,
    /// Output path relative to the destination
    pub relative: PathBuf,
    /// Current contents
    pub contents: Vec<u8>,
    /// Present only while a source map is being collected
    pub source_map: Option<SourceMapState>,
}

impl Asset {
    pub fn new(source: impl Into<PathBuf>, relative: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self { source: source.into(), relative: relative.into(), contents, source_map: None }
    }

    /// Read a file from disk.
    pub fn read(source: &Path, relative: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read(source)?;
        Ok(Self::new(source, relative, contents))
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.contents)
    }

    /// Replace the contents.
    pub fn with_contents(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.contents = contents.into();
        self
    }

    /// Change the output extension.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.relative.set_extension(extension);
        self
    }

    /// File name of the output, for messages.
    pub fn display_name(&self) -> String {
        self.relative.display().to_string()
    }
}
