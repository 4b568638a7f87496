use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{FileError, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Version 2.0: deflate, data descriptors.
pub const VERSION_NEEDED: u16 = 20;
/// Upper byte 3 = UNIX attributes in `external_attrs`.
pub const VERSION_MADE_BY: u16 = (3 << 8) | VERSION_NEEDED;

/// General purpose bit 3: sizes and CRC follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose bit 11: file name is UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor - 16 bytes with signature
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Single-disk record for `entries` entries.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(invalid("bad end of central directory record"));
        }

        Self::read_fields(&mut Cursor::new(&data[4..])).map_err(|e| invalid(&e.to_string()))
    }

    fn read_fields(cursor: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.extend_from_slice(Self::SIGNATURE);
        buf.write_u16::<LittleEndian>(self.disk_number)?;
        buf.write_u16::<LittleEndian>(self.disk_with_cd)?;
        buf.write_u16::<LittleEndian>(self.disk_entries)?;
        buf.write_u16::<LittleEndian>(self.total_entries)?;
        buf.write_u32::<LittleEndian>(self.cd_size)?;
        buf.write_u32::<LittleEndian>(self.cd_offset)?;
        buf.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// One archive entry, as recorded in the central directory.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ArchiveEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Parse one central directory file header at the cursor, leaving the
    /// cursor on the next header.
    pub fn read_central(cursor: &mut Cursor<&[u8]>) -> io::Result<Self> {
        let len = cursor.get_ref().len() as u64;
        if len.saturating_sub(cursor.position()) < CDFH_MIN_SIZE as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "central directory truncated",
            ));
        }

        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad central directory file header",
            ));
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();
        let is_directory = file_name.ends_with('/');

        // Extra field and comment are not used
        let skip = extra_field_length as u64 + file_comment_length as u64;
        cursor.set_position(cursor.position() + skip);

        Ok(Self {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            last_mod_time,
            last_mod_date,
            is_directory,
        })
    }

    /// Local file header for a streamed entry: CRC and sizes are zero and
    /// come later in the data descriptor.
    pub fn write_local_header(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        let name = self.file_name.as_bytes();
        buf.extend_from_slice(LFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        buf.write_u16::<LittleEndian>(FLAG_DATA_DESCRIPTOR | FLAG_UTF8)?;
        buf.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        buf.write_u16::<LittleEndian>(self.last_mod_time)?;
        buf.write_u16::<LittleEndian>(self.last_mod_date)?;
        buf.write_u32::<LittleEndian>(0)?;
        buf.write_u32::<LittleEndian>(0)?;
        buf.write_u32::<LittleEndian>(0)?;
        buf.write_u16::<LittleEndian>(name_len(name)?)?;
        buf.write_u16::<LittleEndian>(0)?;
        buf.extend_from_slice(name);
        Ok(())
    }

    pub fn write_data_descriptor(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
        buf.write_u32::<LittleEndian>(self.crc32)?;
        buf.write_u32::<LittleEndian>(zip32(self.compressed_size)?)?;
        buf.write_u32::<LittleEndian>(zip32(self.uncompressed_size)?)?;
        Ok(())
    }

    pub fn write_central_header(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        let name = self.file_name.as_bytes();
        // rw-r--r-- regular file
        let external_attrs: u32 = 0o100644 << 16;
        buf.extend_from_slice(CDFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        buf.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        buf.write_u16::<LittleEndian>(FLAG_DATA_DESCRIPTOR | FLAG_UTF8)?;
        buf.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        buf.write_u16::<LittleEndian>(self.last_mod_time)?;
        buf.write_u16::<LittleEndian>(self.last_mod_date)?;
        buf.write_u32::<LittleEndian>(self.crc32)?;
        buf.write_u32::<LittleEndian>(zip32(self.compressed_size)?)?;
        buf.write_u32::<LittleEndian>(zip32(self.uncompressed_size)?)?;
        buf.write_u16::<LittleEndian>(name_len(name)?)?;
        buf.write_u16::<LittleEndian>(0)?; // extra field
        buf.write_u16::<LittleEndian>(0)?; // comment
        buf.write_u16::<LittleEndian>(0)?; // disk number start
        buf.write_u16::<LittleEndian>(0)?; // internal attrs
        buf.write_u32::<LittleEndian>(external_attrs)?;
        buf.write_u32::<LittleEndian>(zip32(self.lfh_offset)?)?;
        buf.extend_from_slice(name);
        Ok(())
    }
}

/// Convert a timestamp to DOS `(time, date)` fields in UTC.
///
/// Times before 1980 clamp to 1980-01-01 00:00:00, the earliest DOS date.
pub fn dos_datetime(time: SystemTime) -> (u16, u16) {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    if year < 1980 {
        return (0, (1 << 5) | 1);
    }
    let year = year.min(2107);
    let rem = secs % 86_400;
    let (hour, minute, second) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    let time = ((hour as u16) << 11) | ((minute as u16) << 5) | ((second / 2) as u16);
    let date = (((year - 1980) as u16) << 9) | ((month as u16) << 5) | day as u16;
    (time, date)
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn name_len(name: &[u8]) -> io::Result<u16> {
    u16::try_from(name.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry name too long"))
}

fn zip32(value: u64) -> io::Result<u32> {
    u32::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "archive exceeds ZIP32 limits"))
}

pub(crate) fn invalid(msg: &str) -> FileError {
    FileError::InvalidArchive(msg.to_string())
}
