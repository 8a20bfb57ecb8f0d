//! Sandboxed filesystem explorer.
//!
//! A [`FileExplorer`] is bound to one root directory. Every client-supplied
//! path is resolved through a [`PathSandbox`] before anything touches the
//! disk, and the resulting [`FileNode`]s can be snapshotted as
//! [`protocol::FileTree`]s or renamed, moved and deleted.
//!
//! The explorer is synchronous; async callers run it on a blocking thread.

pub mod error;
pub mod metadata;
pub mod node;
pub mod ownership;
pub mod sandbox;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

pub use error::ExplorerError;
pub use metadata::{FileStats, MetadataExtractor};
pub use node::{FileNode, Listing};
pub use ownership::{native_resolver, OwnershipResolver, RawStat};
pub use sandbox::{PathSandbox, ResolvedPath};

/// Entry point for browsing and mutating a sandboxed directory.
#[derive(Debug, Clone)]
pub struct FileExplorer {
    sandbox: PathSandbox,
    extractor: MetadataExtractor,
}

impl FileExplorer {
    /// Create an explorer rooted at `root` using the host's ownership lookup.
    ///
    /// Relative roots are made absolute against the current directory. The
    /// root must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ExplorerError> {
        Self::with_resolver(root, native_resolver())
    }

    /// Create an explorer with an explicit ownership resolver.
    pub fn with_resolver(
        root: impl AsRef<Path>,
        resolver: Arc<dyn OwnershipResolver>,
    ) -> Result<Self, ExplorerError> {
        let root = root.as_ref();
        let absolute = std::path::absolute(root).map_err(|e| ExplorerError::from_read(root, e))?;

        let metadata =
            fs::metadata(&absolute).map_err(|e| ExplorerError::from_read(&absolute, e))?;
        if !metadata.is_dir() {
            return Err(ExplorerError::Io {
                path: absolute,
                source: io::Error::new(io::ErrorKind::InvalidInput, "root is not a directory"),
            });
        }

        debug!("File explorer rooted at {}", absolute.display());
        Ok(Self {
            sandbox: PathSandbox::new(absolute),
            extractor: MetadataExtractor::new(resolver),
        })
    }

    /// The absolute sandbox root.
    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    /// Resolve a relative path against the root without touching the disk.
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, ExplorerError> {
        self.sandbox.resolve(relative)
    }

    /// Open the entry at `relative`.
    pub fn get_file(&self, relative: &str) -> Result<FileNode, ExplorerError> {
        let resolved = self.resolve(relative)?;
        debug!("Opening {}", resolved.as_path().display());
        FileNode::open(resolved, &self.extractor)
    }

    /// Metadata of the entry at `relative`.
    pub fn get_file_stats(&self, relative: &str) -> Result<FileStats, ExplorerError> {
        self.get_file(relative).map(FileNode::into_stats)
    }
}
