//! On-disk header records and shared archive types.
//!
//! All multi-byte integers are little endian. Every archive starts with the
//! two byte magic `"DX"` followed by a version number that selects the field
//! widths for the rest of the header; v5 uses 32-bit offsets, v6 and later
//! use 64-bit ones.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use binrw::{BinRead, BinWrite};

use crate::profile::{FieldWidth, VersionProfile};

/// Entries are stored without encryption.
pub const FLAG_NO_CIPHER: u32 = 1 << 0;
/// Entries are encrypted with the ChaCha cipher (v8 only).
pub const FLAG_CHACHA: u32 = 1 << 1;

/// Read-only attribute bit, mirroring the host filesystem convention.
pub const ATTRIB_READONLY: u32 = 0x01;
/// Directory attribute bit.
pub const ATTRIB_DIRECTORY: u32 = 0x10;

/// Windows tick count (100 ns units since 1601) of the Unix epoch.
pub const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

/// v5 archive header: 32 bytes, 32-bit offsets.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"DX", little)]
pub struct RawHeaderV5 {
    pub version: u16,
    pub header_size: u32,
    pub data_start: u32,
    pub directory_offset: u32,
    pub file_table_offset: u32,
    pub dir_table_offset: u32,
    pub code_flags: u32,
    pub huffman_threshold: u8,
    pub reserved: [u8; 3],
}

/// v6+ archive header: 64 bytes, 64-bit offsets.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"DX", little)]
pub struct RawHeaderWide {
    pub version: u16,
    pub header_size: u32,
    pub data_start: u64,
    pub directory_offset: u64,
    pub file_table_offset: u64,
    pub dir_table_offset: u64,
    pub code_flags: u32,
    pub huffman_threshold: u8,
    pub reserved: [u8; 19],
}

/// Header fields with the width differences flattened away.
///
/// `header_size` is the on-disk length of the encrypted and compressed
/// directory block; `directory_offset` is its absolute position in the file.
/// The two table offsets are relative to the start of the decompressed block.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArchiveHeader {
    pub version: u16,
    pub header_size: u32,
    pub data_start: u64,
    pub directory_offset: u64,
    pub file_table_offset: u64,
    pub dir_table_offset: u64,
    pub code_flags: u32,
    pub huffman_threshold: u8,
}

impl ArchiveHeader {
    pub fn no_cipher(&self) -> bool {
        self.code_flags & FLAG_NO_CIPHER != 0
    }

    pub fn to_v5(&self) -> RawHeaderV5 {
        RawHeaderV5 {
            version: self.version,
            header_size: self.header_size,
            data_start: self.data_start as u32,
            directory_offset: self.directory_offset as u32,
            file_table_offset: self.file_table_offset as u32,
            dir_table_offset: self.dir_table_offset as u32,
            code_flags: self.code_flags,
            huffman_threshold: self.huffman_threshold,
            reserved: [0; 3],
        }
    }

    pub fn to_wide(&self) -> RawHeaderWide {
        RawHeaderWide {
            version: self.version,
            header_size: self.header_size,
            data_start: self.data_start,
            directory_offset: self.directory_offset,
            file_table_offset: self.file_table_offset,
            dir_table_offset: self.dir_table_offset,
            code_flags: self.code_flags,
            huffman_threshold: self.huffman_threshold,
            reserved: [0; 19],
        }
    }

    /// Whether every offset fits the width of `profile`'s header record.
    pub fn fits(&self, profile: VersionProfile) -> bool {
        match profile.width() {
            FieldWidth::Wide => true,
            FieldWidth::Narrow => {
                let max = u64::from(u32::MAX);
                self.data_start <= max
                    && self.directory_offset <= max
                    && self.file_table_offset <= max
                    && self.dir_table_offset <= max
            }
        }
    }
}

impl From<RawHeaderV5> for ArchiveHeader {
    fn from(raw: RawHeaderV5) -> Self {
        Self {
            version: raw.version,
            header_size: raw.header_size,
            data_start: u64::from(raw.data_start),
            directory_offset: u64::from(raw.directory_offset),
            file_table_offset: u64::from(raw.file_table_offset),
            dir_table_offset: u64::from(raw.dir_table_offset),
            code_flags: raw.code_flags,
            huffman_threshold: raw.huffman_threshold,
        }
    }
}

impl From<RawHeaderWide> for ArchiveHeader {
    fn from(raw: RawHeaderWide) -> Self {
        Self {
            version: raw.version,
            header_size: raw.header_size,
            data_start: raw.data_start,
            directory_offset: raw.directory_offset,
            file_table_offset: raw.file_table_offset,
            dir_table_offset: raw.dir_table_offset,
            code_flags: raw.code_flags,
            huffman_threshold: raw.huffman_threshold,
        }
    }
}

/// Host metadata carried alongside an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub attributes: u32,
    /// Creation time in Windows ticks.
    pub create_time: u64,
    /// Last access time in Windows ticks.
    pub access_time: u64,
    /// Last write time in Windows ticks.
    pub write_time: u64,
}

impl EntryMetadata {
    /// Capture attributes and timestamps from host metadata.
    pub fn from_fs(meta: &std::fs::Metadata) -> Self {
        let mut attributes = 0;
        if meta.is_dir() {
            attributes |= ATTRIB_DIRECTORY;
        }
        if meta.permissions().readonly() {
            attributes |= ATTRIB_READONLY;
        }
        Self {
            attributes,
            create_time: meta.created().map(system_to_filetime).unwrap_or(0),
            access_time: meta.accessed().map(system_to_filetime).unwrap_or(0),
            write_time: meta.modified().map(system_to_filetime).unwrap_or(0),
        }
    }

    /// Metadata for a directory synthesized during packing.
    pub fn directory() -> Self {
        Self {
            attributes: ATTRIB_DIRECTORY,
            ..Self::default()
        }
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & ATTRIB_DIRECTORY != 0
    }
}

/// Convert a host timestamp to Windows ticks; times before 1601 clamp to 0.
pub fn system_to_filetime(time: SystemTime) -> u64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => FILETIME_UNIX_EPOCH + since.as_nanos() as u64 / 100,
        Err(before) => {
            let back = before.duration().as_nanos() as u64 / 100;
            FILETIME_UNIX_EPOCH.saturating_sub(back)
        }
    }
}

/// Convert Windows ticks back to a host timestamp; `None` for ticks before
/// the Unix epoch or the zero placeholder.
pub fn filetime_to_system(ticks: u64) -> Option<SystemTime> {
    if ticks < FILETIME_UNIX_EPOCH {
        return None;
    }
    let since = ticks - FILETIME_UNIX_EPOCH;
    let secs = since / 10_000_000;
    let nanos = (since % 10_000_000) * 100;
    Some(UNIX_EPOCH + Duration::new(secs, nanos as u32))
}

#[cfg(test)]
mod test {
    use std::io::Cursor;
    use std::time::{Duration, UNIX_EPOCH};

    use binrw::{BinRead, BinWrite};
    use pretty_assertions::assert_eq;

    use super::{
        filetime_to_system, system_to_filetime, ArchiveHeader, RawHeaderV5, RawHeaderWide,
        FILETIME_UNIX_EPOCH, FLAG_NO_CIPHER,
    };

    #[test]
    fn read_v5_header() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x44, 0x58, 0x05, 0x00,
            0x40, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00,
            0x80, 0x00, 0x00, 0x00,
            0x10, 0x00, 0x00, 0x00,
            0x44, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00,
        ]);

        let expected = RawHeaderV5 {
            version: 5,
            header_size: 64,
            data_start: 32,
            directory_offset: 128,
            file_table_offset: 16,
            dir_table_offset: 68,
            code_flags: FLAG_NO_CIPHER,
            huffman_threshold: 10,
            reserved: [0; 3],
        };

        assert_eq!(RawHeaderV5::read(&mut input).unwrap(), expected);
    }

    #[test]
    fn write_v5_header() {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x44, 0x58, 0x05, 0x00,
            0x40, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00,
            0x80, 0x00, 0x00, 0x00,
            0x10, 0x00, 0x00, 0x00,
            0x44, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00,
        ];

        let header = RawHeaderV5 {
            version: 5,
            header_size: 64,
            data_start: 32,
            directory_offset: 128,
            file_table_offset: 16,
            dir_table_offset: 68,
            code_flags: FLAG_NO_CIPHER,
            huffman_threshold: 10,
            reserved: [0; 3],
        };

        let mut actual = Vec::new();
        header.write(&mut Cursor::new(&mut actual)).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn wide_header_roundtrips_through_bytes() {
        let header = ArchiveHeader {
            version: 8,
            header_size: 1234,
            data_start: 64,
            directory_offset: 0x1_0000_0000,
            file_table_offset: 400,
            dir_table_offset: 500,
            code_flags: 0,
            huffman_threshold: 255,
        };

        let mut bytes = Vec::new();
        header.to_wide().write(&mut Cursor::new(&mut bytes)).unwrap();
        assert_eq!(bytes.len(), 64);

        let back = RawHeaderWide::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(ArchiveHeader::from(back), header);
    }

    #[test]
    fn bad_magic_fails_to_parse() {
        let mut input = Cursor::new(vec![0u8; 32]);
        assert!(RawHeaderV5::read(&mut input).is_err());
    }

    #[test]
    fn filetime_conversion_roundtrips_on_tick_boundaries() {
        let time = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_700);
        let ticks = system_to_filetime(time);
        assert_eq!(filetime_to_system(ticks), Some(time));
    }

    #[test]
    fn filetime_epoch_is_1601() {
        assert_eq!(
            filetime_to_system(FILETIME_UNIX_EPOCH),
            Some(UNIX_EPOCH)
        );
        assert_eq!(filetime_to_system(0), None);
    }
}
