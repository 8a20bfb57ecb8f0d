//! Filesystem entries as navigable, mutable nodes.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use protocol::{ErrorCode, FileTree, FileType, SkippedEntry};
use tracing::{debug, info, warn};

use super::error::ExplorerError;
use super::metadata::{to_posix, FileStats, MetadataExtractor};
use super::sandbox::ResolvedPath;
use super::FileExplorer;

/// Immediate entries of a directory.
#[derive(Debug, Default)]
pub struct Listing {
    /// Entries opened as nodes.
    pub nodes: Vec<FileNode>,
    /// Entries that were listed but could not be opened.
    pub skipped: Vec<SkippedEntry>,
}

impl Listing {
    /// Every entry the directory held, opened or skipped.
    pub fn entry_count(&self) -> usize {
        self.nodes.len() + self.skipped.len()
    }

    fn skip(&mut self, path: &Path, reason: ErrorCode) {
        self.skipped.push(SkippedEntry {
            path: to_posix(path),
            reason,
        });
    }
}

/// A file or directory at a known path, with its metadata.
///
/// The path and the stats always describe the same entry: a successful
/// rename or move updates both. [`FileNode::delete`] consumes the node, so a
/// deleted node cannot be used again.
#[derive(Debug)]
pub struct FileNode {
    path: PathBuf,
    stats: FileStats,
    root: Arc<Path>,
    extractor: MetadataExtractor,
}

impl FileNode {
    /// Open the entry at a sandbox-resolved path.
    ///
    /// Fails with [`ExplorerError::NotFound`] when nothing is there (or a
    /// symlink dangles) and with [`ExplorerError::UnsupportedFileType`] for
    /// sockets, fifos and devices.
    pub fn open(path: ResolvedPath, extractor: &MetadataExtractor) -> Result<Self, ExplorerError> {
        let (path, root) = path.into_parts();
        Self::open_in(path, root, extractor.clone())
    }

    fn open_in(
        path: PathBuf,
        root: Arc<Path>,
        extractor: MetadataExtractor,
    ) -> Result<Self, ExplorerError> {
        let stats = extractor.extract(&path)?;
        Ok(Self {
            path,
            stats,
            root,
            extractor,
        })
    }

    /// Absolute path of the entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata captured when the node was opened or last relocated.
    pub fn stats(&self) -> &FileStats {
        &self.stats
    }

    /// Take the metadata, dropping the node.
    pub fn into_stats(self) -> FileStats {
        self.stats
    }

    /// Entry kind.
    pub fn kind(&self) -> FileType {
        self.stats.kind
    }

    /// Whether this is the sandbox root itself.
    pub fn is_root(&self) -> bool {
        self.path.as_path() == &*self.root
    }

    /// Directories are listed unless they are reached through a symlink.
    fn is_expandable(&self) -> bool {
        self.stats.is_dir() && !self.stats.is_link
    }

    /// Immediate children, or `None` for files and symlinked directories.
    ///
    /// Entries that vanish during the listing, dangling symlinks and special
    /// files go to [`Listing::skipped`]. Order is whatever the OS returns.
    pub fn children(&self) -> Result<Option<Listing>, ExplorerError> {
        if !self.is_expandable() {
            return Ok(None);
        }

        let entries =
            fs::read_dir(&self.path).map_err(|e| ExplorerError::from_read(&self.path, e))?;

        let mut listing = Listing::default();
        for entry in entries {
            let entry = entry.map_err(|e| ExplorerError::from_read(&self.path, e))?;
            match Self::open_in(entry.path(), Arc::clone(&self.root), self.extractor.clone()) {
                Ok(child) => listing.nodes.push(child),
                Err(ExplorerError::NotFound(path)) => {
                    warn!("Skipping missing or dangling entry {}", path.display());
                    listing.skip(&path, ErrorCode::NotFound);
                }
                Err(ExplorerError::UnsupportedFileType(path)) => {
                    warn!("Skipping special file {}", path.display());
                    listing.skip(&path, ErrorCode::UnsupportedFileType);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Some(listing))
    }

    /// Snapshot the subtree rooted at this node.
    ///
    /// `depth` 0 yields no children, a positive depth expands that many
    /// levels, and a negative depth expands everything. Symlinked
    /// directories are never expanded, so cycles cannot recurse. Entries
    /// that cannot be opened are reported in [`FileTree::skipped`].
    pub fn to_tree(&self, depth: i64) -> Result<FileTree, ExplorerError> {
        let next = if depth < 0 { depth } else { depth - 1 };
        let listing = if depth == 0 {
            None
        } else {
            self.children()?
        };

        let (children, skipped) = match listing {
            Some(listing) => {
                let trees = listing
                    .nodes
                    .iter()
                    .map(|child| child.to_tree(next))
                    .collect::<Result<Vec<_>, _>>()?;
                (Some(trees), listing.skipped)
            }
            None => (None, Vec::new()),
        };

        Ok(FileTree {
            path: to_posix(&self.path),
            stats: self.stats.to_protocol(),
            children,
            skipped,
        })
    }

    /// Remove the entry from disk.
    ///
    /// Directories are removed recursively. A symlink is removed itself,
    /// never its target.
    pub fn delete(self) -> Result<(), ExplorerError> {
        self.ensure_not_root("delete")?;

        let result = match (self.stats.kind, self.stats.is_link) {
            (FileType::Directory, false) => fs::remove_dir_all(&self.path),
            (FileType::Directory, true) if cfg!(windows) => fs::remove_dir(&self.path),
            _ => fs::remove_file(&self.path),
        };
        result.map_err(|e| ExplorerError::mutation("delete", &self.path, e))?;

        info!("Deleted {}", self.path.display());
        Ok(())
    }

    /// Rename within the current parent directory.
    ///
    /// `new_name` must be one plain path component. An existing entry with
    /// that name is never overwritten.
    pub fn rename(&mut self, new_name: &str) -> Result<(), ExplorerError> {
        validate_entry_name(new_name)?;
        self.ensure_not_root("rename")?;

        let destination = match self.path.parent() {
            Some(parent) => parent.join(new_name),
            None => {
                return Err(ExplorerError::PathTraversal(
                    "entry has no parent directory".to_string(),
                ))
            }
        };
        self.relocate(destination, "rename")
    }

    /// Move to `destination`, a path relative to the explorer's root.
    ///
    /// The destination goes through the same sandbox resolution as any
    /// request path.
    pub fn move_to(&mut self, destination: &str, explorer: &FileExplorer) -> Result<(), ExplorerError> {
        let resolved = explorer.resolve(destination)?;
        self.move_to_path(resolved.as_path().to_path_buf())
    }

    /// Move to an already absolute destination, skipping sandbox resolution.
    pub(crate) fn move_to_path(&mut self, destination: PathBuf) -> Result<(), ExplorerError> {
        self.relocate(destination, "move")
    }

    fn relocate(&mut self, destination: PathBuf, action: &'static str) -> Result<(), ExplorerError> {
        self.ensure_not_root(action)?;

        if fs::symlink_metadata(&destination).is_ok() {
            return Err(ExplorerError::mutation(
                action,
                &destination,
                io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
            ));
        }
        if self.is_expandable() && destination.starts_with(&self.path) {
            return Err(ExplorerError::mutation(
                action,
                &self.path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot move a directory into itself",
                ),
            ));
        }

        move_entry(&self.path, &destination)
            .map_err(|e| ExplorerError::mutation(action, &self.path, e))?;
        info!(
            "{} {} -> {}",
            if action == "rename" { "Renamed" } else { "Moved" },
            self.path.display(),
            destination.display()
        );

        // The entry has moved; keep the path current even if the stat fails.
        self.path = destination;
        self.stats = self.extractor.extract(&self.path)?;
        Ok(())
    }

    fn ensure_not_root(&self, action: &str) -> Result<(), ExplorerError> {
        if self.is_root() {
            return Err(ExplorerError::PathTraversal(format!(
                "cannot {} the sandbox root",
                action
            )));
        }
        Ok(())
    }
}

/// A new name must be exactly one normal path component.
fn validate_entry_name(name: &str) -> Result<(), ExplorerError> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ExplorerError::PathTraversal(format!(
            "invalid entry name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Rename on the same device, copy-then-remove across devices.
fn move_entry(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                "{} and {} are on different devices, copying",
                from.display(),
                to.display()
            );
            copy_across_devices(from, to)
        }
        Err(e) => Err(e),
    }
}

/// Copy, then remove the source. A failed copy removes whatever it left at
/// `to` and keeps the source.
fn copy_across_devices(from: &Path, to: &Path) -> io::Result<()> {
    if let Err(e) = copy_recursive(from, to) {
        if let Err(cleanup) = remove_entry(to) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove partial copy {}: {}", to.display(), cleanup);
            }
        }
        return Err(e);
    }
    remove_entry(from)
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(from)?;
    let file_type = metadata.file_type();

    if file_type.is_symlink() {
        copy_symlink(from, to)
    } else if file_type.is_dir() {
        fs::create_dir(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
        fs::set_permissions(to, metadata.permissions())
    } else {
        fs::copy(from, to).map(|_| ())
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(windows)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    if fs::metadata(from).map(|m| m.is_dir()).unwrap_or(false) {
        std::os::windows::fs::symlink_dir(target, to)
    } else {
        std::os::windows::fs::symlink_file(target, to)
    }
}
