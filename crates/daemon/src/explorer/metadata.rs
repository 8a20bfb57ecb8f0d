//! Metadata extraction for single filesystem entries.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use protocol::FileType;

use super::error::ExplorerError;
use super::ownership::{self, OwnershipResolver};

/// Normalized metadata of one entry.
///
/// Everything except `is_link` and `link_target` describes the entry after
/// symlinks are followed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStats {
    /// Last path component.
    pub name: String,
    /// Absolute path of the entry (not of its link target).
    pub path: PathBuf,
    /// Directory or regular file.
    pub kind: FileType,
    /// Owner id, 0 where unavailable.
    pub uid: u32,
    /// Group id, 0 where unavailable.
    pub gid: u32,
    /// Owner display name.
    pub owner: String,
    /// Group display name.
    pub group: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Epoch seconds; inode change time on Unix.
    pub created: f64,
    /// Epoch seconds.
    pub modified: f64,
    /// Whether the entry itself is a symbolic link.
    pub is_link: bool,
    /// Fully resolved target, set only for links.
    pub link_target: Option<PathBuf>,
}

impl FileStats {
    /// Whether the entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Directory
    }

    /// Convert to the wire record.
    pub fn to_protocol(&self) -> protocol::FileStats {
        protocol::FileStats {
            name: self.name.clone(),
            path: to_posix(&self.path),
            file_type: self.kind,
            uid: self.uid,
            gid: self.gid,
            owner: self.owner.clone(),
            group: self.group.clone(),
            size: self.size,
            created: self.created,
            modified: self.modified,
            is_link: self.is_link,
            link_target: self.link_target.as_deref().map(to_posix),
        }
    }
}

/// Render a path with forward slashes.
pub fn to_posix(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Reads metadata from the OS and normalizes it into [`FileStats`].
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    resolver: Arc<dyn OwnershipResolver>,
}

impl MetadataExtractor {
    /// Create an extractor using the given ownership resolver.
    pub fn new(resolver: Arc<dyn OwnershipResolver>) -> Self {
        Self { resolver }
    }

    /// Create an extractor for the host platform.
    pub fn native() -> Self {
        Self::new(ownership::native_resolver())
    }

    /// Extract metadata of the entry at `path`.
    ///
    /// A dangling symlink is reported as [`ExplorerError::NotFound`]. Entries
    /// that are neither files nor directories after following links yield
    /// [`ExplorerError::UnsupportedFileType`].
    pub fn extract(&self, path: &Path) -> Result<FileStats, ExplorerError> {
        let metadata = fs::metadata(path).map_err(|e| ExplorerError::from_read(path, e))?;

        let kind = if metadata.is_dir() {
            FileType::Directory
        } else if metadata.is_file() {
            FileType::File
        } else {
            return Err(ExplorerError::UnsupportedFileType(path.to_path_buf()));
        };

        let raw = ownership::raw_stat(&metadata);
        let owner = self
            .resolver
            .owner_name(path, &raw)
            .map_err(|e| ExplorerError::from_read(path, e))?;
        let group = self
            .resolver
            .group_name(path, &raw)
            .map_err(|e| ExplorerError::from_read(path, e))?;

        let is_link = fs::symlink_metadata(path)
            .map_err(|e| ExplorerError::from_read(path, e))?
            .file_type()
            .is_symlink();
        let link_target = if is_link {
            Some(fs::canonicalize(path).map_err(|e| ExplorerError::from_read(path, e))?)
        } else {
            None
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| to_posix(path));

        Ok(FileStats {
            name,
            path: path.to_path_buf(),
            kind,
            uid: raw.uid,
            gid: raw.gid,
            owner,
            group,
            size: raw.size,
            created: raw.created,
            modified: raw.modified,
            is_link,
            link_target,
        })
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::native()
    }
}
