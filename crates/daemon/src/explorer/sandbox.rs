//! Resolution of client-supplied paths against the sandbox root.
//!
//! Any input containing the two characters `..` is refused, including names
//! such as `notes..txt`. All checks run before the filesystem is touched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::ExplorerError;

/// An absolute path proven, at construction, to lie inside a sandbox root.
///
/// Only [`PathSandbox::resolve`] produces values of this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    root: Arc<Path>,
}

impl ResolvedPath {
    /// The resolved absolute path.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The sandbox root this path was resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this path is the sandbox root itself.
    pub fn is_root(&self) -> bool {
        self.path.as_path() == &*self.root
    }

    pub(crate) fn into_parts(self) -> (PathBuf, Arc<Path>) {
        (self.path, self.root)
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Validates and resolves relative paths against a fixed root.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: Arc<Path>,
}

impl PathSandbox {
    /// Create a sandbox rooted at `root`, which must already be absolute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        Self {
            root: Arc::from(root.components().collect::<PathBuf>()),
        }
    }

    /// The sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` against the root.
    ///
    /// Fails with [`ExplorerError::PathTraversal`] when `relative` contains
    /// `..` anywhere or starts with a root marker. No existence check is
    /// made and symlinks are left alone.
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, ExplorerError> {
        if relative.contains("..") {
            return Err(ExplorerError::PathTraversal(format!(
                "paths containing \"..\" are not allowed: {}",
                relative
            )));
        }

        let candidate = Path::new(relative);
        if relative.starts_with('/')
            || relative.starts_with('\\')
            || candidate.has_root()
            || candidate.is_absolute()
        {
            return Err(ExplorerError::PathTraversal(format!(
                "absolute paths are not allowed: {}",
                relative
            )));
        }

        // Lexical cleanup of "." and repeated separators only.
        let path: PathBuf = self.root.join(candidate).components().collect();

        // A drive-relative prefix such as `C:foo` replaces the root on join.
        if !path.starts_with(&self.root) {
            return Err(ExplorerError::PathTraversal(format!(
                "path escapes the sandbox: {}",
                relative
            )));
        }

        Ok(ResolvedPath {
            path,
            root: Arc::clone(&self.root),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> PathSandbox {
        PathSandbox::new(std::path::absolute("sandbox").unwrap())
    }

    #[test]
    fn test_resolve_nested_relative() {
        let sandbox = sandbox();
        let resolved = sandbox.resolve("sub/file.txt").unwrap();
        assert_eq!(resolved.as_path(), sandbox.root().join("sub").join("file.txt"));
        assert!(resolved.as_path().starts_with(sandbox.root()));
        assert!(!resolved.is_root());
    }

    #[test]
    fn test_resolve_empty_and_dot_are_root() {
        let sandbox = sandbox();
        assert!(sandbox.resolve("").unwrap().is_root());
        assert!(sandbox.resolve(".").unwrap().is_root());
        assert!(sandbox.resolve("./").unwrap().is_root());
    }

    #[test]
    fn test_resolve_strips_current_dir_segments() {
        let sandbox = sandbox();
        let resolved = sandbox.resolve("./a/./b").unwrap();
        assert_eq!(resolved.as_path(), sandbox.root().join("a").join("b"));
    }

    #[test]
    fn test_reject_parent_segments_anywhere() {
        let sandbox = sandbox();
        for input in ["..", "../etc/passwd", "a/../../b", "a/..", "sub/.."] {
            let result = sandbox.resolve(input);
            assert!(
                matches!(result, Err(ExplorerError::PathTraversal(_))),
                "expected traversal error for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_reject_double_dot_inside_names() {
        // Substring check, not segment-aware.
        let sandbox = sandbox();
        assert!(matches!(
            sandbox.resolve("notes..txt"),
            Err(ExplorerError::PathTraversal(_))
        ));
        assert!(matches!(
            sandbox.resolve("dir/...hidden"),
            Err(ExplorerError::PathTraversal(_))
        ));
    }

    #[test]
    fn test_reject_absolute_paths() {
        let sandbox = sandbox();
        for input in ["/etc/passwd", "/", "\\windows", "//server/share"] {
            let result = sandbox.resolve(input);
            assert!(
                matches!(result, Err(ExplorerError::PathTraversal(_))),
                "expected traversal error for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_home_shorthand_is_not_expanded() {
        let sandbox = sandbox();
        let resolved = sandbox.resolve("~").unwrap();
        assert_eq!(resolved.as_path(), sandbox.root().join("~"));
    }

    #[test]
    fn test_resolve_does_not_touch_filesystem() {
        let sandbox = PathSandbox::new(std::path::absolute("definitely-not-here-42").unwrap());
        assert!(sandbox.resolve("missing/file").is_ok());
    }

    #[test]
    fn test_resolved_path_keeps_root() {
        let sandbox = sandbox();
        let resolved = sandbox.resolve("x").unwrap();
        assert_eq!(resolved.root(), sandbox.root());
        let (path, root) = resolved.into_parts();
        assert!(path.starts_with(&*root));
    }
}
