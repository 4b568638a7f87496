//! # filekit
//!
//! File utilities with a small, explicit contract per operation:
//!
//! - [`compress()`]: pack a file or directory tree into a zip archive
//! - [`download()`]: serve a local file to a [`ResponseSink`] as an attachment,
//!   after checking its name against an [`AllowedTypes`] allowlist, and
//!   optionally delete it afterwards
//! - [`delete()`] / [`clean()`]: fail-fast recursive removal with a fallback for
//!   access-denied errors
//! - [`fetch_from_url`]: best-effort download of a URL into a local file,
//!   reporting a [`FetchOutcome`] instead of an error
//!
//! Every operation is a single async call that owns its files for its
//! duration; nothing is shared between calls.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use filekit::{CompressOptions, ArchiveReader, compress};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let summary = compress(Path::new("logs"), Path::new("logs.zip"), &CompressOptions::default()).await?;
//!     println!("{} entries", summary.entries);
//!
//!     let reader = ArchiveReader::open(Path::new("logs.zip")).await?;
//!     for name in reader.names() {
//!         println!("{name}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod compress;
pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod io;
pub mod logging;
pub mod remove;
pub mod zip;

pub use cli::Cli;
pub use compress::compress;
pub use config::{CompressOptions, CompressionKind, DownloadPolicy, FetchOptions, FileKitConfig};
pub use download::{AllowedTypes, download};
pub use error::{FileError, Result};
pub use fetch::{FetchOutcome, fetch_from_url};
pub use io::{MemoryResponse, ResponseSink, WriterSink};
pub use remove::{OsRemove, RemoveOps, Remover, clean, delete};
pub use zip::{ArchiveEntry, ArchiveReader, ArchiveSummary, ArchiveWriter, CompressionMethod};
