//! Compress a file or directory tree into a zip archive.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWrite, BufWriter};
use tracing::{debug, info, warn};

use crate::config::CompressOptions;
use crate::error::{FileError, Result};
use crate::zip::{ArchiveSummary, ArchiveWriter};

/// Compress `from` (a file or a directory) into the zip archive `to`.
///
/// A directory source contributes one entry per regular file beneath it,
/// named by its path relative to `from` with `/` separators (`a.txt`,
/// `sub/b.txt`). A file source produces a single entry named after the file.
/// Empty directories produce nothing. Children are visited in name order.
///
/// # Errors
///
/// [`FileError::NotFound`] if `from` does not exist; the archive is not
/// created in that case. I/O failures while walking or writing propagate;
/// the archive written so far is closed and left on disk.
pub async fn compress(from: &Path, to: &Path, options: &CompressOptions) -> Result<ArchiveSummary> {
    let source = fs::metadata(from)
        .await
        .map_err(|e| FileError::from_stat(from, e))?;

    let file = File::create(to).await.map_err(|e| FileError::io(to, e))?;
    let writer = ArchiveWriter::new(BufWriter::new(file), options.method.method(), options.level)
        .map_err(|e| FileError::io(to, e))?;

    let mut packer = Packer {
        writer,
        archive: to,
        archive_real: fs::canonicalize(to).await.ok(),
        buf: vec![0u8; options.buffer_size.max(1)],
    };

    let walked = if source.is_dir() {
        packer.add_tree(from).await
    } else if packer.is_archive(from).await {
        debug!(path = %from.display(), "source is the archive itself");
        Ok(())
    } else {
        let name = entry_name(from);
        packer.add_file(from, &name, source.modified().ok()).await
    };

    // The archive is closed either way; a failed walk leaves a partial archive
    let closed = packer.writer.finish().await;
    if let Err(e) = walked {
        warn!(source = %from.display(), archive = %to.display(), error = %e, "compression failed");
        return Err(e);
    }
    let (_, summary) = closed.map_err(|e| FileError::io(to, e))?;

    info!(
        source = %from.display(),
        archive = %to.display(),
        entries = summary.entries,
        bytes_in = summary.bytes_in,
        archive_size = summary.archive_size,
        "compressed"
    );
    Ok(summary)
}

struct Packer<'a, W> {
    writer: ArchiveWriter<W>,
    archive: &'a Path,
    /// Canonical archive path, so a walk over its own directory skips it.
    archive_real: Option<PathBuf>,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> Packer<'_, W> {
    /// Depth-first walk in name order. `pending` is a stack, so children are
    /// pushed in reverse to pop in order.
    async fn add_tree(&mut self, root: &Path) -> Result<()> {
        let mut pending = children(root, None).await?;

        while let Some((path, name)) = pending.pop() {
            let meta = match fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // Vanished or dangling symlink
                    debug!(path = %path.display(), "skipping missing entry");
                    continue;
                }
                Err(e) => return Err(FileError::io(&path, e)),
            };

            if meta.is_dir() {
                pending.extend(children(&path, Some(&name)).await?);
            } else if self.is_archive(&path).await {
                debug!(entry = %name, "skipping the archive being written");
            } else {
                self.add_file(&path, &name, meta.modified().ok()).await?;
            }
        }
        Ok(())
    }

    async fn is_archive(&self, path: &Path) -> bool {
        let Some(archive) = &self.archive_real else {
            return false;
        };
        if path.file_name() != archive.file_name() {
            return false;
        }
        fs::canonicalize(path).await.is_ok_and(|real| &real == archive)
    }

    async fn add_file(&mut self, path: &Path, name: &str, modified: Option<SystemTime>) -> Result<()> {
        let mut file = File::open(path)
            .await
            .map_err(|e| FileError::io(path, e))?;

        debug!(entry = name, "adding");
        self.writer
            .start_entry(name, modified.unwrap_or_else(SystemTime::now))
            .await
            .map_err(|e| FileError::io(self.archive, e))?;

        loop {
            let n = file
                .read(&mut self.buf)
                .await
                .map_err(|e| FileError::io(path, e))?;
            if n == 0 {
                break;
            }
            self.writer
                .write_data(&self.buf[..n])
                .await
                .map_err(|e| FileError::io(self.archive, e))?;
        }
        Ok(())
    }
}

/// Direct children of `dir` with their entry names, sorted descending.
async fn children(dir: &Path, prefix: Option<&str>) -> Result<Vec<(PathBuf, String)>> {
    let mut read_dir = fs::read_dir(dir).await.map_err(|e| FileError::io(dir, e))?;
    let mut out = Vec::new();
    while let Some(child) = read_dir
        .next_entry()
        .await
        .map_err(|e| FileError::io(dir, e))?
    {
        let file_name = utf8_name(&child.path(), &child.file_name());
        let name = match prefix {
            Some(prefix) => format!("{prefix}/{file_name}"),
            None => file_name,
        };
        out.push((child.path(), name));
    }
    out.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(out)
}

fn entry_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => utf8_name(path, name),
        None => utf8_name(path, path.as_os_str()),
    }
}

/// Entry names are UTF-8; anything else is replaced with U+FFFD and logged,
/// since two such names can collide inside the archive.
fn utf8_name(path: &Path, name: &OsStr) -> String {
    match name.to_str() {
        Some(name) => name.to_string(),
        None => {
            warn!(path = %path.display(), "file name is not UTF-8; entry name is lossy");
            name.to_string_lossy().into_owned()
        }
    }
}
