//! Streaming ZIP writer.
//!
//! Entries are written in one pass without seeking: each local file header
//! carries zero sizes and sets general purpose bit 3, and the real CRC and
//! sizes follow the data in a data descriptor. The central directory and the
//! End of Central Directory record are written by [`ArchiveWriter::finish`].
//!
//! Every byte handed to the underlying writer also feeds a running CRC-32 and
//! byte counter for the archive as a whole, reported in [`ArchiveSummary`].

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::{self, Write};
use std::time::SystemTime;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::structures::{ArchiveEntry, CompressionMethod, EndOfCentralDirectory, dos_datetime};

/// Totals for a finished archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    /// Sum of the uncompressed entry sizes.
    pub bytes_in: u64,
    /// Size of the archive as written.
    pub archive_size: u64,
    /// CRC-32 over every byte of the archive.
    pub archive_crc32: u32,
}

struct OpenEntry {
    entry: ArchiveEntry,
    crc: Crc,
    data_start: u64,
    encoder: Option<DeflateEncoder<Vec<u8>>>,
}

/// Writes a ZIP archive into any [`AsyncWrite`].
///
/// ```ignore
/// let mut writer = ArchiveWriter::new(file, CompressionMethod::Deflate, 6)?;
/// writer.start_entry("a.txt", SystemTime::now()).await?;
/// writer.write_data(b"hello").await?;
/// let (file, summary) = writer.finish().await?;
/// ```
pub struct ArchiveWriter<W> {
    inner: W,
    offset: u64,
    checksum: Crc,
    method: CompressionMethod,
    level: Compression,
    finished: Vec<ArchiveEntry>,
    current: Option<OpenEntry>,
    scratch: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> ArchiveWriter<W> {
    /// Create a writer. `level` only applies to [`CompressionMethod::Deflate`].
    pub fn new(inner: W, method: CompressionMethod, level: u32) -> io::Result<Self> {
        if let CompressionMethod::Unknown(m) = method {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported compression method {m}"),
            ));
        }
        Ok(Self {
            inner,
            offset: 0,
            checksum: Crc::new(),
            method,
            level: Compression::new(level.min(9)),
            finished: Vec::new(),
            current: None,
            scratch: Vec::with_capacity(256),
        })
    }

    /// Entries completed so far.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.finished
    }

    /// Close the current entry, if any, and begin a new one named `name`.
    pub async fn start_entry(&mut self, name: &str, modified: SystemTime) -> io::Result<()> {
        self.finish_entry().await?;

        // 0xFFFF in the EOCD means "see ZIP64 record"
        if self.finished.len() >= usize::from(u16::MAX) - 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "archive exceeds ZIP32 entry limit",
            ));
        }

        let (last_mod_time, last_mod_date) = dos_datetime(modified);
        let entry = ArchiveEntry {
            file_name: name.to_string(),
            compression_method: self.method,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: self.offset,
            last_mod_time,
            last_mod_date,
            is_directory: false,
        };

        self.scratch.clear();
        entry.write_local_header(&mut self.scratch)?;
        self.flush_scratch().await?;

        let encoder = match self.method {
            CompressionMethod::Deflate => Some(DeflateEncoder::new(Vec::new(), self.level)),
            _ => None,
        };
        self.current = Some(OpenEntry {
            entry,
            crc: Crc::new(),
            data_start: self.offset,
            encoder,
        });
        Ok(())
    }

    /// Append content to the current entry.
    pub async fn write_data(&mut self, data: &[u8]) -> io::Result<()> {
        let Self {
            inner,
            offset,
            checksum,
            current,
            ..
        } = self;
        let open = current
            .as_mut()
            .ok_or_else(|| io::Error::other("write_data called before start_entry"))?;

        open.crc.update(data);
        open.entry.uncompressed_size += data.len() as u64;

        match open.encoder.as_mut() {
            Some(encoder) => {
                encoder.write_all(data)?;
                let out = encoder.get_mut();
                emit(inner, offset, checksum, out).await?;
                out.clear();
            }
            None => emit(inner, offset, checksum, data).await?,
        }
        Ok(())
    }

    /// Write the central directory and EOCD, flush, and hand back the inner writer.
    pub async fn finish(mut self) -> io::Result<(W, ArchiveSummary)> {
        self.finish_entry().await?;

        let cd_offset = self.offset;
        self.scratch.clear();
        for entry in &self.finished {
            entry.write_central_header(&mut self.scratch)?;
        }
        let cd_size = self.scratch.len() as u64;
        EndOfCentralDirectory::new(
            self.finished.len() as u16,
            zip32(cd_size)?,
            zip32(cd_offset)?,
        )
        .write_to(&mut self.scratch)?;
        self.flush_scratch().await?;
        self.inner.flush().await?;

        let summary = ArchiveSummary {
            entries: self.finished.len(),
            bytes_in: self.finished.iter().map(|e| e.uncompressed_size).sum(),
            archive_size: self.offset,
            archive_crc32: self.checksum.sum(),
        };
        Ok((self.inner, summary))
    }

    async fn finish_entry(&mut self) -> io::Result<()> {
        let Some(mut open) = self.current.take() else {
            return Ok(());
        };

        if let Some(encoder) = open.encoder.take() {
            let tail = encoder.finish()?;
            emit(&mut self.inner, &mut self.offset, &mut self.checksum, &tail).await?;
        }

        open.entry.crc32 = open.crc.sum();
        open.entry.compressed_size = self.offset - open.data_start;

        self.scratch.clear();
        open.entry.write_data_descriptor(&mut self.scratch)?;
        self.flush_scratch().await?;

        self.finished.push(open.entry);
        Ok(())
    }

    async fn flush_scratch(&mut self) -> io::Result<()> {
        let Self {
            inner,
            offset,
            checksum,
            scratch,
            ..
        } = self;
        emit(inner, offset, checksum, scratch).await
    }
}

async fn emit<W: AsyncWrite + Unpin>(
    inner: &mut W,
    offset: &mut u64,
    checksum: &mut Crc,
    bytes: &[u8],
) -> io::Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    inner.write_all(bytes).await?;
    checksum.update(bytes);
    *offset += bytes.len() as u64;
    if *offset > u64::from(u32::MAX) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "archive exceeds ZIP32 size limit",
        ));
    }
    Ok(())
}

fn zip32(value: u64) -> io::Result<u32> {
    u32::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "archive exceeds ZIP32 limits"))
}
