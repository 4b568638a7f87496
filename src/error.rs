//! Error taxonomy shared by the file operations.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors reported by [`compress`](crate::compress()), [`download`](crate::download()),
/// [`delete`](crate::delete()) / [`clean`](crate::clean()) and the archive reader.
///
/// URL fetching never produces one of these; see [`FetchOutcome`](crate::FetchOutcome).
#[derive(Debug, Error)]
pub enum FileError {
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("{} is not a file", path.display())]
    NotAFile { path: PathBuf },

    #[error("file type of {file_name:?} is not allowed for download")]
    UnsupportedType { file_name: String },

    /// Permission failure that the fallback removal could not get past.
    /// `source` is the error of the first attempt.
    #[error("access denied: {}", path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid archive: {0}")]
    InvalidArchive(String),
}

impl FileError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        FileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Map a stat/open failure, turning `NotFound` into [`FileError::NotFound`].
    pub(crate) fn from_stat(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            FileError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            FileError::io(path, source)
        }
    }
}

pub type Result<T> = std::result::Result<T, FileError>;
