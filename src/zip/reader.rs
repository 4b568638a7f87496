//! ZIP archive reader.
//!
//! ZIP files are read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all entries
//! 3. For extraction, read each entry's Local File Header and data
//!
//! ZIP64 archives are rejected; the writer in this crate never produces them.

use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::{Cursor, Read, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{FileError, Result};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Random-access reader over a ZIP archive on disk.
pub struct ArchiveReader {
    file: File,
    path: PathBuf,
    size: u64,
    entries: Vec<ArchiveEntry>,
}

impl ArchiveReader {
    /// Open `path` and load its central directory.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| FileError::from_stat(path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| FileError::io(path, e))?
            .len();

        let mut reader = Self {
            file,
            path: path.to_path_buf(),
            size,
            entries: Vec::new(),
        };
        reader.entries = reader.load_entries().await?;
        Ok(reader)
    }

    /// Entries in central directory order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Entry names in central directory order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.file_name.as_str()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.file_name == name)
    }

    /// Read and decompress the content of `entry`, verifying its CRC-32.
    pub async fn read_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut lfh = [0u8; LFH_SIZE];
        self.read_at(entry.lfh_offset, &mut lfh).await?;
        if &lfh[0..4] != LFH_SIGNATURE {
            return Err(invalid("bad local file header"));
        }

        // Name and extra field lengths sit at the end of the fixed part
        let name_len = u16::from_le_bytes([lfh[26], lfh[27]]) as u64;
        let extra_len = u16::from_le_bytes([lfh[28], lfh[29]]) as u64;
        let data_offset = entry.lfh_offset + LFH_SIZE as u64 + name_len + extra_len;

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.read_at(data_offset, &mut raw).await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(&raw[..])
                    .read_to_end(&mut out)
                    .map_err(|e| invalid(&format!("{}: {e}", entry.file_name)))?;
                out
            }
            CompressionMethod::Unknown(m) => {
                return Err(invalid(&format!(
                    "{}: unsupported compression method {m}",
                    entry.file_name
                )));
            }
        };

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 || data.len() as u64 != entry.uncompressed_size {
            return Err(invalid(&format!("{}: checksum mismatch", entry.file_name)));
        }
        Ok(data)
    }

    /// Convenience for `find` + `read_entry`.
    pub async fn read_by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .find(name)
            .cloned()
            .ok_or_else(|| invalid(&format!("no entry named {name}")))?;
        self.read_entry(&entry).await
    }

    async fn load_entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let eocd = self.find_eocd().await?;
        if eocd.is_zip64() {
            return Err(invalid("ZIP64 archives are not supported"));
        }

        let mut cd = vec![0u8; eocd.cd_size as usize];
        self.read_at(eocd.cd_offset as u64, &mut cd).await?;

        let mut cursor = Cursor::new(cd.as_slice());
        (0..eocd.total_entries)
            .map(|_| ArchiveEntry::read_central(&mut cursor).map_err(|e| invalid(&e.to_string())))
            .collect()
    }

    /// The EOCD is usually the last 22 bytes; with a trailing comment it sits
    /// earlier, so search backwards through the maximum comment window.
    async fn find_eocd(&mut self) -> Result<EndOfCentralDirectory> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(invalid("file too small to be a ZIP archive"));
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let mut buf = vec![0u8; search_size as usize];
        self.read_at(search_start, &mut buf).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                return EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE]);
            }
        }

        Err(invalid("not a ZIP archive"))
    }

    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.size {
            return Err(invalid("record points past end of file"));
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| FileError::io(&self.path, e))?;
        self.file
            .read_exact(buf)
            .await
            .map_err(|e| FileError::io(&self.path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ArchiveWriter;
    use std::time::SystemTime;

    async fn write_archive(path: &Path, method: CompressionMethod, files: &[(&str, &[u8])]) {
        let mut writer = ArchiveWriter::new(Vec::new(), method, 6).unwrap();
        for (name, data) in files {
            writer.start_entry(name, SystemTime::now()).await.unwrap();
            writer.write_data(data).await.unwrap();
        }
        let (bytes, _) = writer.finish().await.unwrap();
        tokio::fs::write(path, bytes).await.unwrap();
    }

    #[tokio::test]
    async fn reads_back_deflated_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        let big = b"lorem ipsum ".repeat(500);
        write_archive(
            &path,
            CompressionMethod::Deflate,
            &[("a.txt", b"alpha"), ("sub/b.txt", &big)],
        )
        .await;

        let mut reader = ArchiveReader::open(&path).await.unwrap();
        assert_eq!(reader.names(), vec!["a.txt", "sub/b.txt"]);
        assert_eq!(reader.read_by_name("a.txt").await.unwrap(), b"alpha");
        assert_eq!(reader.read_by_name("sub/b.txt").await.unwrap(), big);
        let entry = reader.find("sub/b.txt").unwrap();
        assert!(entry.compressed_size < entry.uncompressed_size);
    }

    #[tokio::test]
    async fn reads_back_stored_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stored.zip");
        write_archive(&path, CompressionMethod::Stored, &[("only", b"plain bytes")]).await;

        let mut reader = ArchiveReader::open(&path).await.unwrap();
        let entry = reader.entries()[0].clone();
        assert_eq!(entry.compression_method, CompressionMethod::Stored);
        assert_eq!(entry.compressed_size, entry.uncompressed_size);
        assert_eq!(reader.read_entry(&entry).await.unwrap(), b"plain bytes");
    }

    #[tokio::test]
    async fn finds_eocd_behind_a_comment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commented.zip");
        write_archive(&path, CompressionMethod::Stored, &[("x", b"1")]).await;

        // Patch the comment length and append a comment
        let mut bytes = tokio::fs::read(&path).await.unwrap();
        let len = bytes.len();
        let comment = b"built by a test";
        bytes[len - 2..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        bytes.extend_from_slice(comment);
        tokio::fs::write(&path, bytes).await.unwrap();

        let reader = ArchiveReader::open(&path).await.unwrap();
        assert_eq!(reader.names(), vec!["x"]);
    }

    #[tokio::test]
    async fn rejects_non_zip_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        tokio::fs::write(&path, b"definitely not an archive, just some text")
            .await
            .unwrap();

        let err = ArchiveReader::open(&path).await.err().unwrap();
        assert!(matches!(err, FileError::InvalidArchive(_)));
    }

    #[tokio::test]
    async fn missing_archive_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveReader::open(&dir.path().join("nope.zip"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FileError::NotFound { .. }));
    }

    #[tokio::test]
    async fn detects_corrupted_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.zip");
        write_archive(&path, CompressionMethod::Stored, &[("c", b"clean")]).await;

        let mut bytes = tokio::fs::read(&path).await.unwrap();
        let data_start = LFH_SIZE + 1;
        bytes[data_start] = b'X';
        tokio::fs::write(&path, bytes).await.unwrap();

        let mut reader = ArchiveReader::open(&path).await.unwrap();
        let err = reader.read_by_name("c").await.err().unwrap();
        assert!(err.to_string().contains("checksum mismatch"));
    }
}
