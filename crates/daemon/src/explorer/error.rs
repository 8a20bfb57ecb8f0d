//! Error taxonomy of the file explorer.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by the sandboxed file explorer.
///
/// Nothing is retried or recovered inside the explorer; every failure is
/// returned to the caller.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// The requested path escapes the sandbox or is absolute.
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    /// Nothing exists at the resolved path.
    #[error("file does not exist: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but is neither a regular file nor a directory.
    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFileType(PathBuf),

    /// The filesystem refused a rename, move or delete.
    #[error("failed to {action} {}: {source}", path.display())]
    Mutation {
        /// Operation that failed.
        action: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Reading metadata or listing a directory failed for a reason other
    /// than the path being missing.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl ExplorerError {
    /// Classify a failed read: a missing path becomes [`ExplorerError::NotFound`].
    pub(crate) fn from_read(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ExplorerError::NotFound(path.to_path_buf())
        } else {
            ExplorerError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub(crate) fn mutation(action: &'static str, path: &Path, source: io::Error) -> Self {
        ExplorerError::Mutation {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error means the target no longer (or never) existed.
    pub fn is_not_found(&self) -> bool {
        match self {
            ExplorerError::NotFound(_) => true,
            ExplorerError::Mutation { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
