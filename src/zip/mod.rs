//! ZIP archive writing and reading.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format records (headers, data descriptor, EOCD) and
//!   their little-endian encoding
//! - [`writer`]: single-pass streaming writer used by [`compress`](crate::compress())
//! - [`reader`]: central-directory reader for listing and verifying archives
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - STORED (no compression) and DEFLATE methods
//! - UTF-8 entry names
//!
//! ## Limitations
//!
//! - No ZIP64: at most 65534 entries and 4 GiB per archive
//! - No encryption, no multi-disk archives

mod reader;
mod structures;
mod writer;

pub use reader::ArchiveReader;
pub use structures::{ArchiveEntry, CompressionMethod, dos_datetime};
pub use writer::{ArchiveSummary, ArchiveWriter};
