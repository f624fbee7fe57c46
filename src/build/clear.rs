//! Output root removal.

use crate::build::BuildContext;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error while clearing the output root.
#[derive(Debug, Error)]
pub enum ClearError {
    /// The output root overlaps the project root or the sources
    #[error("refusing to clear {}: it contains the project sources", path.display())]
    Unsafe { path: PathBuf },
    /// Deletion failed part-way
    #[error("failed to clear {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recursively delete the output root.
///
/// A missing root counts as cleared.
pub fn clear_output(ctx: &BuildContext) -> Result<PathBuf, ClearError> {
    let dist = ctx.dist_dir();
    ensure_disjoint(&dist, ctx.project_root(), &ctx.app_dir())?;

    match std::fs::remove_dir_all(&dist) {
        Ok(()) => {
            tracing::debug!(path = %dist.display(), "removed output root");
            Ok(dist)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(dist),
        Err(source) => Err(ClearError::Io { path: dist, source }),
    }
}

fn ensure_disjoint(dist: &Path, project_root: &Path, app: &Path) -> Result<(), ClearError> {
    let dist_norm = normalize(dist);
    if dist_norm == normalize(project_root) || normalize(app).starts_with(&dist_norm) {
        return Err(ClearError::Unsafe { path: dist.to_path_buf() });
    }
    Ok(())
}

/// Lexical normalization; `.` and `..` are folded without touching the disk.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
