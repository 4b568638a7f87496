//! Serve a local file to a [`ResponseSink`] as an attachment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::config::DownloadPolicy;
use crate::error::{FileError, Result};
use crate::io::ResponseSink;
use crate::remove;

pub const CONTENT_TYPE: &str = "multipart/form-data";
pub const CHARSET: &str = "UTF-8";

/// File extensions that may be served, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AllowedTypes(BTreeSet<String>);

impl AllowedTypes {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            types
                .into_iter()
                .map(|t| t.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.0.contains(&extension.to_ascii_lowercase())
    }

    /// Whether `file_name` has an extension in the set.
    pub fn permits(&self, file_name: &str) -> bool {
        extension(file_name).is_some_and(|ext| self.contains(ext))
    }
}

impl Default for AllowedTypes {
    fn default() -> Self {
        Self::new(["xlsx", "zip", "pdf"])
    }
}

impl From<Vec<String>> for AllowedTypes {
    fn from(types: Vec<String>) -> Self {
        Self::new(types)
    }
}

impl From<AllowedTypes> for Vec<String> {
    fn from(types: AllowedTypes) -> Self {
        types.0.into_iter().collect()
    }
}

/// Text after the last `.`, if any.
fn extension(file_name: &str) -> Option<&str> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// `attachment;fileName=<name>` with the name form-url-encoded.
pub fn content_disposition(file_name: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
    format!("attachment;fileName={encoded}")
}

/// Stream `file_path` into `sink` as a download named `file_name`.
///
/// The extension of `file_name`, not of `file_path`, is checked against
/// `policy.allowed_types` before the file is opened. The body is copied in
/// `policy.chunk_size` chunks through one buffer.
///
/// When `delete_after` is set the source is deleted once streaming ends,
/// whether or not it succeeded; a failed deletion is logged and otherwise
/// ignored. Validation failures never delete anything.
///
/// Returns the number of body bytes written.
pub async fn download<S>(
    file_path: &Path,
    file_name: &str,
    delete_after: bool,
    sink: &mut S,
    policy: &DownloadPolicy,
) -> Result<u64>
where
    S: ResponseSink + ?Sized,
{
    let meta = fs::metadata(file_path)
        .await
        .map_err(|e| FileError::from_stat(file_path, e))?;
    if meta.is_dir() {
        return Err(FileError::NotAFile {
            path: file_path.to_path_buf(),
        });
    }
    if !policy.allowed_types.permits(file_name) {
        return Err(FileError::UnsupportedType {
            file_name: file_name.to_string(),
        });
    }

    sink.set_header("Content-Disposition", &content_disposition(file_name));
    sink.set_content_type(CONTENT_TYPE);
    sink.set_character_encoding(CHARSET);

    let streamed = stream_file(file_path, sink, policy.chunk_size).await;

    if delete_after {
        if let Err(e) = remove::delete(file_path).await {
            warn!(path = %file_path.display(), error = %e, "failed to delete after download");
        }
    }

    match streamed {
        Ok(bytes) => {
            info!(path = %file_path.display(), file_name, bytes, "served download");
            Ok(bytes)
        }
        Err(e) => {
            warn!(path = %file_path.display(), error = %e, "download interrupted");
            Err(e)
        }
    }
}

async fn stream_file<S>(path: &Path, sink: &mut S, chunk_size: usize) -> Result<u64>
where
    S: ResponseSink + ?Sized,
{
    let mut file = File::open(path).await.map_err(|e| FileError::io(path, e))?;
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = file.read(&mut buf).await.map_err(|e| FileError::io(path, e))?;
        if n == 0 {
            break;
        }
        sink.write_body(&buf[..n])
            .await
            .map_err(|e| FileError::io(path, e))?;
        total += n as u64;
    }

    sink.finish().await.map_err(|e| FileError::io(path, e))?;
    Ok(total)
}
