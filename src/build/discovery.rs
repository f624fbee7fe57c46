//! Source file discovery for the build system.
//!
//! Resolves glob patterns below the source root and records, for every match,
//! its path relative to the pattern's glob base (the literal directories
//! before the first wildcard). That relative path is what a task mirrors
//! under its destination.

use glob::{glob_with, MatchOptions};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
    /// IO error during file enumeration
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path
    pub path: PathBuf,
    /// Path below the glob base
    pub relative: PathBuf,
}

fn has_magic(component: &str) -> bool {
    component.contains(['*', '?', '['])
}

/// The literal directory prefix of a glob pattern.
///
/// `pages/**/*.pug` → `pages`, `common/styles/app.css` → `common/styles`,
/// `*.js` → ``.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let components: Vec<Component> = path.components().collect();

    for (i, component) in components.iter().enumerate() {
        let text = component.as_os_str().to_string_lossy();
        // The last literal component is the file itself
        if has_magic(&text) || i + 1 == components.len() {
            break;
        }
        base.push(component.as_os_str());
    }

    base
}

/// Discover files matching a glob pattern below `base_dir`.
///
/// Directories are skipped. Results are sorted by path.
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<SourceFile>, DiscoveryError> {
    let full_pattern = base_dir.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();
    let root = base_dir.join(glob_base(pattern));

    // Dotfiles (`.DS_Store`, editor swap files) only match an explicit leading dot
    let options = MatchOptions { require_literal_leading_dot: true, ..Default::default() };
    let paths = glob_with(&pattern_str, options)
        .map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if !path.is_file() {
                    continue;
                }
                let relative = path
                    .strip_prefix(&root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
                files.push(SourceFile { path, relative });
            }
            Err(e) => {
                tracing::warn!("error reading path: {}", e);
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Discover files for a list of patterns, deduplicated by path.
///
/// When two patterns match the same file, the first pattern's relative path
/// wins.
pub fn discover_all(base_dir: &Path, patterns: &[String]) -> Result<Vec<SourceFile>, DiscoveryError> {
    let mut all: BTreeMap<PathBuf, SourceFile> = BTreeMap::new();
    for pattern in patterns {
        for file in discover_files(base_dir, pattern)? {
            all.entry(file.path.clone()).or_insert(file);
        }
    }
    Ok(all.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("pages/**/*.pug"), PathBuf::from("pages"));
        assert_eq!(glob_base("common/styles/app.css"), PathBuf::from("common/styles"));
        assert_eq!(glob_base("common/scripts/*.js"), PathBuf::from("common/scripts"));
        assert_eq!(glob_base("*.js"), PathBuf::new());
        assert_eq!(glob_base("common/images/**/*.png"), PathBuf::from("common/images"));
    }

    #[test]
    fn test_discover_files_recursive_relative_paths() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "pages/index.pug");
        create_test_file(temp.path(), "pages/about/index.pug");
        create_test_file(temp.path(), "pages/about/notes.txt");

        let files = discover_files(temp.path(), "pages/**/*.pug").unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![PathBuf::from("about/index.pug"), PathBuf::from("index.pug")]
        );
    }

    #[test]
    fn test_discover_files_literal_pattern() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "common/styles/app.css");
        create_test_file(temp.path(), "common/styles/other.css");

        let files = discover_files(temp.path(), "common/styles/app.css").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("app.css"));
    }

    #[test]
    fn test_discover_files_skips_directories() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "fonts/a/regular.woff2");

        let files = discover_files(temp.path(), "fonts/**/*").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("a/regular.woff2"));
    }

    #[test]
    fn test_discover_files_skips_dotfiles() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "fonts/regular.woff2");
        create_test_file(temp.path(), "fonts/.DS_Store");
        create_test_file(temp.path(), "fonts/.regular.woff2.swp");

        let files = discover_files(temp.path(), "fonts/**/*").unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        assert_eq!(relative, vec![PathBuf::from("regular.woff2")]);

        let explicit = discover_files(temp.path(), "fonts/.DS_Store").unwrap();
        assert_eq!(explicit.len(), 1);
    }

    #[test]
    fn test_discover_files_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let files = discover_files(temp.path(), "nothing/**/*.svg").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_discover_files_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let result = discover_files(temp.path(), "[");
        assert!(matches!(result, Err(DiscoveryError::InvalidPattern(_, _))));
    }

    #[test]
    fn test_discover_all_deduplicates() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "img/a.png");
        create_test_file(temp.path(), "img/b.jpg");

        let patterns = vec!["img/*.png".to_string(), "img/*".to_string()];
        let files = discover_all(temp.path(), &patterns).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("img/a.png"));
    }
}
