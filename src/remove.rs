//! Recursive delete and clean.
//!
//! Removal of each filesystem entry is a two-tier strategy: the primary OS
//! call, then, only when that call is denied access, a fallback that clears
//! the read-only attribute and tries again. If the fallback fails as well the
//! error of the primary call is reported as [`FileError::AccessDenied`].
//!
//! Directory traversal stops at the first entry that cannot be removed; later
//! siblings (in name order) and the enclosing directories are left in place.
//! Symbolic links are removed as links and never followed.

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{FileError, Result};

type RemoveFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Primitive removal calls used by [`Remover`].
#[async_trait]
pub trait RemoveOps: Send + Sync {
    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    async fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Second attempt after the primary call was denied access.
    async fn remove_fallback(&self, path: &Path, is_dir: bool) -> io::Result<()>;
}

/// Removal through the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRemove;

#[async_trait]
impl RemoveOps for OsRemove {
    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path).await
    }

    async fn remove_fallback(&self, path: &Path, is_dir: bool) -> io::Result<()> {
        let meta = fs::symlink_metadata(path).await?;
        // set_permissions would follow the link
        if !meta.file_type().is_symlink() {
            let mut perms = meta.permissions();
            make_writable(&mut perms);
            fs::set_permissions(path, perms).await?;
        }
        if is_dir {
            fs::remove_dir(path).await
        } else {
            fs::remove_file(path).await
        }
    }
}

#[cfg(unix)]
fn make_writable(perms: &mut std::fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(perms.mode() | 0o200);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(perms: &mut std::fs::Permissions) {
    perms.set_readonly(false);
}

/// Runs delete and clean over a set of [`RemoveOps`].
#[derive(Debug, Clone, Default)]
pub struct Remover<R = OsRemove> {
    ops: R,
}

impl<R: RemoveOps> Remover<R> {
    pub fn new(ops: R) -> Self {
        Self { ops }
    }

    /// Delete a file, symlink or directory tree.
    ///
    /// A path that does not exist is a success. A directory is cleaned first
    /// and removed once empty; if cleaning fails the directory stays.
    pub fn delete<'a>(&'a self, path: &'a Path) -> RemoveFuture<'a> {
        Box::pin(async move {
            let meta = match fs::symlink_metadata(path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(FileError::io(path, e)),
            };

            if !meta.is_dir() {
                return self.remove_entry(path, false).await;
            }

            self.clean(path).await?;
            match self.remove_entry(path, true).await {
                // Something appeared after the clean; the tree we saw is gone
                Err(FileError::Io { source, .. })
                    if source.kind() == io::ErrorKind::DirectoryNotEmpty =>
                {
                    warn!(path = %path.display(), "directory refilled during delete");
                    Ok(())
                }
                other => other,
            }
        })
    }

    /// Delete every direct child of `dir`, in name order, stopping at the
    /// first failure. A missing path or a non-directory is a no-op.
    pub async fn clean(&self, dir: &Path) -> Result<()> {
        match fs::symlink_metadata(dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(FileError::io(dir, e)),
        }

        for child in sorted_children(dir).await? {
            self.delete(&child).await?;
        }
        Ok(())
    }

    async fn remove_entry(&self, path: &Path, is_dir: bool) -> Result<()> {
        let primary = if is_dir {
            self.ops.remove_dir(path).await
        } else {
            self.ops.remove_file(path).await
        };

        let denied = match primary {
            Ok(()) => {
                debug!(path = %path.display(), "removed");
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => e,
            Err(e) => return Err(FileError::io(path, e)),
        };

        debug!(path = %path.display(), error = %denied, "access denied, trying fallback removal");
        match self.ops.remove_fallback(path, is_dir).await {
            Ok(()) => Ok(()),
            Err(fallback) => {
                debug!(path = %path.display(), error = %fallback, "fallback removal failed");
                Err(FileError::AccessDenied {
                    path: path.to_path_buf(),
                    source: denied,
                })
            }
        }
    }
}

async fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut read_dir = fs::read_dir(dir).await.map_err(|e| FileError::io(dir, e))?;
    let mut children = Vec::new();
    while let Some(child) = read_dir
        .next_entry()
        .await
        .map_err(|e| FileError::io(dir, e))?
    {
        children.push(child.path());
    }
    children.sort();
    Ok(children)
}

/// Delete `path` recursively through the operating system.
///
/// See [`Remover::delete`].
pub async fn delete(path: &Path) -> Result<()> {
    Remover::<OsRemove>::default().delete(path).await?;
    info!(path = %path.display(), "deleted");
    Ok(())
}

/// Delete the contents of `dir`, keeping `dir` itself.
///
/// See [`Remover::clean`].
pub async fn clean(dir: &Path) -> Result<()> {
    Remover::<OsRemove>::default().clean(dir).await?;
    info!(path = %dir.display(), "cleaned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    /// Wraps the OS calls, failing the primary call for one file name.
    struct FailOn {
        name: &'static str,
        kind: io::ErrorKind,
        fallback_works: bool,
        fallbacks: AtomicUsize,
    }

    impl FailOn {
        fn new(name: &'static str, kind: io::ErrorKind, fallback_works: bool) -> Self {
            Self {
                name,
                kind,
                fallback_works,
                fallbacks: AtomicUsize::new(0),
            }
        }

        fn hit(&self, path: &Path) -> bool {
            path.file_name().is_some_and(|n| n == self.name)
        }
    }

    #[async_trait]
    impl RemoveOps for FailOn {
        async fn remove_file(&self, path: &Path) -> io::Result<()> {
            if self.hit(path) {
                return Err(io::Error::from(self.kind));
            }
            OsRemove.remove_file(path).await
        }

        async fn remove_dir(&self, path: &Path) -> io::Result<()> {
            if self.hit(path) {
                return Err(io::Error::from(self.kind));
            }
            OsRemove.remove_dir(path).await
        }

        async fn remove_fallback(&self, path: &Path, is_dir: bool) -> io::Result<()> {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
            if self.fallback_works {
                OsRemove.remove_fallback(path, is_dir).await
            } else {
                Err(io::Error::other("legacy delete returned false"))
            }
        }
    }

    #[tokio::test]
    async fn missing_path_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("ghost");
        delete(&missing).await.unwrap();
        assert!(!missing.exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn directory_with_two_files_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        touch(&target.join("one.txt"));
        touch(&target.join("two.txt"));

        delete(&target).await.unwrap();
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn nested_tree_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        touch(&target.join("a/b/c/deep.txt"));
        touch(&target.join("a/side.txt"));
        std::fs::create_dir_all(target.join("empty/also-empty")).unwrap();

        delete(&target).await.unwrap();
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn single_file_and_read_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ro.txt");
        touch(&file);
        let mut perms = std::fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&file, perms).unwrap();

        delete(&file).await.unwrap();
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn clean_keeps_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.txt"));
        touch(&dir.path().join("sub/b.txt"));

        clean(dir.path()).await.unwrap();
        assert!(dir.path().is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn clean_ignores_files_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keep.txt");
        touch(&file);

        clean(&file).await.unwrap();
        clean(&dir.path().join("missing")).await.unwrap();
        assert!(file.exists());
    }

    #[tokio::test]
    async fn first_failure_stops_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        touch(&target.join("a.txt"));
        touch(&target.join("b.txt"));
        touch(&target.join("c.txt"));

        let remover = Remover::new(FailOn::new("b.txt", io::ErrorKind::Other, true));
        let err = remover.delete(&target).await.err().unwrap();

        assert!(matches!(err, FileError::Io { ref path, .. } if path.ends_with("b.txt")));
        assert!(!target.join("a.txt").exists());
        assert!(target.join("b.txt").exists());
        assert!(target.join("c.txt").exists());
        assert!(target.is_dir());
        // Only permission errors go to the fallback
        assert_eq!(remover.ops.fallbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denied_removal_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        touch(&target.join("locked.txt"));

        let remover = Remover::new(FailOn::new(
            "locked.txt",
            io::ErrorKind::PermissionDenied,
            true,
        ));
        remover.delete(&target).await.unwrap();

        assert!(!target.exists());
        assert_eq!(remover.ops.fallbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fallback_surfaces_original_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("locked.txt");
        touch(&file);

        let remover = Remover::new(FailOn::new(
            "locked.txt",
            io::ErrorKind::PermissionDenied,
            false,
        ));
        let err = remover.delete(&file).await.err().unwrap();

        match err {
            FileError::AccessDenied { path, source } => {
                assert_eq!(path, file);
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected AccessDenied, got {other:?}"),
        }
        assert!(file.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_directory_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        touch(&real.join("precious.txt"));
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        delete(&link).await.unwrap();
        clean(&link).await.unwrap();

        assert!(std::fs::symlink_metadata(&link).is_err());
        assert!(real.join("precious.txt").exists());
    }
}
