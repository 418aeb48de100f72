//! Types for reading DXA archives
//!

use std::fs::{self, File, FileTimes};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use binrw::BinRead;
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::cipher::EntryCipher;
use crate::directory::{self, fold_lookup, FileRecord, ParsedDirectory};
use crate::error::{Error, Result};
use crate::huffman;
use crate::lzss;
use crate::profile::VersionProfile;
use crate::types::{
    filetime_to_system, ArchiveHeader, EntryMetadata, RawHeaderV5, RawHeaderWide, ATTRIB_READONLY,
};

/// A file entry of an opened archive.
///
/// # Warnings
///
/// Entry paths come from the archive. The parser rejects absolute paths and
/// `..` components, but callers joining [`DxaEntry::path`] onto their own
/// directories should still treat it as untrusted input.
#[derive(Debug, Clone, Copy)]
pub struct DxaEntry<'a> {
    path: &'a str,
    record: &'a FileRecord,
}

impl DxaEntry<'_> {
    /// Archive-relative path, `/` separated.
    pub fn path(&self) -> &str {
        self.path
    }

    /// Size of the entry when unpacked.
    pub fn size(&self) -> u64 {
        self.record.original_size
    }

    /// Size of the entry as stored in the archive.
    pub fn stored_size(&self) -> u64 {
        self.record.stored_size
    }

    /// LZSS-compressed length, or `None` when the entry is stored verbatim.
    pub fn compressed_size(&self) -> Option<u64> {
        self.record.is_compressed().then_some(self.record.compressed_size as u64)
    }

    /// Entropy-coded tail length, or `None` when no tail pass was applied.
    pub fn huffman_size(&self) -> Option<u64> {
        self.record.has_huffman_tail().then_some(self.record.huffman_size as u64)
    }

    pub fn attributes(&self) -> u32 {
        self.record.attributes
    }

    /// Last write time in Windows ticks.
    pub fn write_time(&self) -> u64 {
        self.record.write_time
    }

    pub fn metadata(&self) -> EntryMetadata {
        self.record.metadata()
    }
}

/// Outcome of a whole-archive extraction. Entries that failed to decode are
/// recorded here instead of aborting the remaining ones.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub extracted: usize,
    pub failures: Vec<(PathBuf, Error)>,
}

#[derive(Debug)]
struct Shared {
    header: ArchiveHeader,
    profile: VersionProfile,
    cipher: EntryCipher,
    directory: ParsedDirectory,
    /// Archive path to file table index, files only, in file table order.
    files: IndexMap<Box<str>, usize>,
}

/// DXA archive reader
///
/// ```no_run
/// use std::fs::File;
///
/// fn list_contents(path: &std::path::Path) -> wolfarc_dxa::error::Result<()> {
///     let dxa = wolfarc_dxa::DxaArchive::open_auto(File::open(path)?)?;
///
///     for i in 0..dxa.len() {
///         let entry = dxa.by_index(i)?;
///         println!("{} ({} bytes)", entry.path(), entry.size());
///     }
///
///     Ok(())
/// }
/// ```
pub struct DxaArchive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl<R: Read + Seek> DxaArchive<R> {
    /// Open an archive encrypted with the version's stock key (or none).
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with_key(reader, None)
    }

    /// Open an archive with a caller-supplied key. `None` selects the stock
    /// key of whatever version the header reports.
    pub fn open_with_key(mut reader: R, key: Option<&[u8]>) -> Result<Self> {
        let (header, profile, file_len) = read_header(&mut reader)?;
        let cipher = if header.no_cipher() {
            EntryCipher::Plain
        } else {
            match key {
                Some(material) => profile.cipher_for(material),
                None => profile.default_cipher(),
            }
        };
        let shared = load_shared(&mut reader, header, profile, file_len, cipher)?;
        Ok(Self {
            reader,
            shared: Arc::new(shared),
        })
    }

    /// Open an archive by walking the keys the editor is known to have
    /// shipped for its version, in release order.
    #[instrument(skip_all, err)]
    pub fn open_auto(mut reader: R) -> Result<Self> {
        let (header, profile, file_len) = read_header(&mut reader)?;
        if header.no_cipher() {
            let shared = load_shared(&mut reader, header, profile, file_len, EntryCipher::Plain)?;
            return Ok(Self {
                reader,
                shared: Arc::new(shared),
            });
        }
        for key in profile.known_keys() {
            match load_shared(&mut reader, header, profile, file_len, profile.known_cipher(key)) {
                Ok(shared) => {
                    debug!(release = key.release, "stock key matched");
                    return Ok(Self {
                        reader,
                        shared: Arc::new(shared),
                    });
                }
                Err(Error::BadKey) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(Error::BadKey)
    }

    /// Number of file entries (directories not included).
    pub fn len(&self) -> usize {
        self.shared.files.len()
    }

    /// Whether the archive holds no file entries.
    pub fn is_empty(&self) -> bool {
        self.shared.files.is_empty()
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.shared.header
    }

    pub fn profile(&self) -> VersionProfile {
        self.shared.profile
    }

    /// Iterate over the archive paths of all file entries.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.files.keys().map(|s| s.as_ref())
    }

    /// Find an entry by exact path, falling back to the archive's
    /// case-insensitive lookup form.
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        if let Some(index) = self.shared.files.get_index_of(name) {
            return Some(index);
        }
        let folded = fold_lookup(name.as_bytes());
        self.shared
            .files
            .keys()
            .position(|path| fold_lookup(path.as_bytes()) == folded)
    }

    pub fn by_index(&self, index: usize) -> Result<DxaEntry<'_>> {
        let (path, &file_index) = self
            .shared
            .files
            .get_index(index)
            .ok_or_else(|| Error::EntryNotFound(format!("#{index}")))?;
        Ok(DxaEntry {
            path: path.as_ref(),
            record: &self.shared.directory.files[file_index],
        })
    }

    pub fn by_name(&self, name: &str) -> Result<DxaEntry<'_>> {
        let index = self
            .index_for_name(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_owned()))?;
        self.by_index(index)
    }

    /// Decode one entry fully into memory.
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        let (_, &file_index) = self
            .shared
            .files
            .get_index(index)
            .ok_or_else(|| Error::EntryNotFound(format!("#{index}")))?;
        let record = self.shared.directory.files[file_index];
        self.read_record(&record)
    }

    /// Extract every entry under `out_dir`, restoring timestamps and the
    /// read-only attribute. Entries that fail to decode are skipped and
    /// reported; only filesystem trouble with `out_dir` itself is fatal.
    #[instrument(skip(self), err)]
    pub fn extract_to(&mut self, out_dir: &Path) -> Result<ExtractReport> {
        fs::create_dir_all(out_dir)?;
        let shared = Arc::clone(&self.shared);

        for path in shared.directory.dir_paths.iter().skip(1) {
            fs::create_dir_all(out_dir.join(path))?;
        }

        let mut report = ExtractReport::default();
        for (path, &file_index) in &shared.files {
            let record = &shared.directory.files[file_index];
            match self.extract_one(out_dir, path, record) {
                Ok(()) => report.extracted += 1,
                Err(error) => {
                    warn!("skipping {path}: {error}");
                    report.failures.push((PathBuf::from(&**path), error));
                }
            }
        }

        // Directory timestamps last, deepest first, after content writes
        // stopped touching them.
        for (index, path) in shared.directory.dir_paths.iter().enumerate().skip(1).rev() {
            let file_index = shared.directory.dirs[index].dir_file_index as usize;
            restore_dir_times(&out_dir.join(path), &shared.directory.files[file_index]);
        }

        info!(
            extracted = report.extracted,
            failed = report.failures.len(),
            "extraction finished"
        );
        Ok(report)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn extract_one(&mut self, out_dir: &Path, path: &str, record: &FileRecord) -> Result<()> {
        // Decode fully before the destination file exists, so a codec error
        // never leaves a half-written file behind.
        let data = self.read_record(record)?;
        let target = out_dir.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &data)?;
        restore_file_metadata(&target, record)?;
        Ok(())
    }

    fn read_record(&mut self, record: &FileRecord) -> Result<Vec<u8>> {
        self.reader
            .seek(SeekFrom::Start(self.shared.header.data_start + record.data_offset))?;
        let mut buf = vec![0u8; record.stored_size as usize];
        self.reader.read_exact(&mut buf)?;
        self.shared.cipher.apply_at(&mut buf, record.data_offset);

        if record.has_huffman_tail() {
            let split = buf.len() - record.huffman_size as usize;
            let tail = huffman::decode(&buf[split..])?;
            buf.truncate(split);
            buf.extend_from_slice(&tail);
        }
        if record.is_compressed() {
            if buf.len() as u64 != record.compressed_size as u64 {
                return Err(Error::TruncatedStream);
            }
            buf = lzss::decompress(&buf)?;
        }
        if buf.len() as u64 != record.original_size {
            return Err(Error::TruncatedStream);
        }
        Ok(buf)
    }
}

/// Decode a whole archive file onto disk.
///
/// An absent (or empty) `output_dir` extracts alongside the input into a
/// directory named after the archive's file stem. With no key the stock keys
/// of the archive's version are tried in release order.
#[instrument(skip(key), err)]
pub fn decode_archive(
    input: &Path,
    output_dir: Option<&Path>,
    key: Option<&[u8]>,
) -> Result<ExtractReport> {
    let out = match output_dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => input.with_extension(""),
    };
    let file = File::open(input)?;
    let mut archive = match key {
        Some(material) => DxaArchive::open_with_key(file, Some(material))?,
        None => DxaArchive::open_auto(file)?,
    };
    info!("extracting {} entries to {}", archive.len(), out.display());
    archive.extract_to(&out)
}

/// Reconstruct the 12 key bytes of a pre-v8 archive from the fixed header
/// offsets the legacy tooling reads them at. Only meaningful for archives
/// whose magic is *not* `"DX"`; plain-header archives are refused.
pub fn guess_legacy_key<R: Read + Seek>(mut reader: R) -> Result<[u8; 12]> {
    let mut magic = [0u8; 2];
    reader.read_exact(&mut magic)?;
    if &magic == b"DX" {
        return Err(Error::KeyGuessUnsupported);
    }
    let mut key = [0u8; 12];
    // The write order is 0x0C, 0x1C, 0x14.
    for (slot, offset) in [0x0Cu64, 0x1C, 0x14].into_iter().enumerate() {
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(&mut key[slot * 4..slot * 4 + 4])?;
    }
    Ok(key)
}

fn read_header<R: Read + Seek>(reader: &mut R) -> Result<(ArchiveHeader, VersionProfile, u64)> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).map_err(|_| Error::NotAnArchive)?;
    if prefix[0..2] != *b"DX" {
        return Err(Error::NotAnArchive);
    }
    let version = u16::from_le_bytes([prefix[2], prefix[3]]);

    reader.seek(SeekFrom::Start(0))?;
    let header: ArchiveHeader = match version {
        5 => RawHeaderV5::read(reader)?.into(),
        6 | 7 | 8 => RawHeaderWide::read(reader)?.into(),
        other => return Err(Error::UnsupportedVersion(other)),
    };
    let profile = VersionProfile::from_header(version, header.code_flags)?;

    let block_end = header
        .directory_offset
        .checked_add(u64::from(header.header_size))
        .ok_or(Error::InvalidDirectory("directory block outside the file"))?;
    if block_end > file_len || header.data_start > header.directory_offset {
        return Err(Error::InvalidDirectory("directory block outside the file"));
    }
    Ok((header, profile, file_len))
}

/// Map decode failures behind an active cipher to `BadKey`: garbage after
/// decryption is indistinguishable from corruption, and the auto-detect
/// path keys its retries off this.
fn key_sensitive(ciphered: bool, error: Error) -> Error {
    match error {
        Error::IOError(_) => error,
        _ if ciphered => Error::BadKey,
        _ => error,
    }
}

fn load_shared<R: Read + Seek>(
    reader: &mut R,
    header: ArchiveHeader,
    profile: VersionProfile,
    file_len: u64,
    cipher: EntryCipher,
) -> Result<Shared> {
    let ciphered = !cipher.is_plain();

    reader.seek(SeekFrom::Start(header.directory_offset))?;
    let mut block = vec![0u8; header.header_size as usize];
    reader.read_exact(&mut block)?;
    cipher.apply_at(&mut block, header.directory_offset);

    let block = lzss::decompress(&block).map_err(|e| key_sensitive(ciphered, e))?;
    let parsed =
        directory::parse(&block, &header, profile).map_err(|e| key_sensitive(ciphered, e))?;

    // Nothing is extracted from an archive whose entries reach past the end
    // of the file.
    let data_len = file_len.saturating_sub(header.data_start);
    for record in parsed.files.iter().filter(|f| !f.is_directory()) {
        let end = record.data_offset.checked_add(record.stored_size);
        if end.is_none() || end.is_some_and(|e| e > data_len) {
            return Err(key_sensitive(
                ciphered,
                Error::InvalidDirectory("entry data outside the file"),
            ));
        }
    }

    let mut files = IndexMap::with_capacity(parsed.files.len());
    for (index, (record, path)) in parsed.files.iter().zip(&parsed.file_paths).enumerate() {
        if !record.is_directory() {
            files.insert(path.clone().into_boxed_str(), index);
        }
    }

    Ok(Shared {
        header,
        profile,
        cipher,
        directory: parsed,
        files,
    })
}

fn restore_file_metadata(path: &Path, record: &FileRecord) -> Result<()> {
    if let Some(times) = times_of(record) {
        let file = File::options().write(true).open(path)?;
        file.set_times(times)?;
    }
    if record.attributes & ATTRIB_READONLY != 0 {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

fn restore_dir_times(path: &Path, record: &FileRecord) {
    // Best effort: not every platform lets us touch directory handles.
    if let Some(times) = times_of(record) {
        if let Ok(dir) = File::open(path) {
            let _ = dir.set_times(times);
        }
    }
}

fn times_of(record: &FileRecord) -> Option<FileTimes> {
    let mut times = FileTimes::new();
    let mut any = false;
    if let Some(t) = filetime_to_system(record.write_time) {
        times = times.set_modified(t);
        any = true;
    }
    if let Some(t) = filetime_to_system(record.access_time) {
        times = times.set_accessed(t);
        any = true;
    }
    any.then_some(times)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::{guess_legacy_key, DxaArchive};
    use crate::error::Error;

    #[test]
    fn read_invalid_magic() {
        let mut input = vec![0u8; 64];
        input[0] = 0x40;
        input[1] = 0x58;
        assert!(matches!(
            DxaArchive::open(Cursor::new(input)),
            Err(Error::NotAnArchive)
        ));
    }

    #[test]
    fn read_unsupported_version() {
        let mut input = vec![0u8; 64];
        input[0..2].copy_from_slice(b"DX");
        input[2..4].copy_from_slice(&4u16.to_le_bytes());
        assert!(matches!(
            DxaArchive::open(Cursor::new(input)),
            Err(Error::UnsupportedVersion(4))
        ));
    }

    #[test]
    fn read_truncated_prefix() {
        assert!(matches!(
            DxaArchive::open(Cursor::new(vec![0x44u8])),
            Err(Error::NotAnArchive)
        ));
    }

    #[test]
    fn guess_key_concatenates_the_legacy_offsets() {
        let mut input = vec![0u8; 0x20];
        input[0x0C..0x10].copy_from_slice(&[1, 2, 3, 4]);
        input[0x1C..0x20].copy_from_slice(&[5, 6, 7, 8]);
        input[0x14..0x18].copy_from_slice(&[9, 10, 11, 12]);

        let key = guess_legacy_key(Cursor::new(input)).unwrap();
        assert_eq!(key, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn guess_key_refuses_plain_headers() {
        let mut input = vec![0u8; 0x20];
        input[0..2].copy_from_slice(b"DX");
        assert!(matches!(
            guess_legacy_key(Cursor::new(input)),
            Err(Error::KeyGuessUnsupported)
        ));
    }
}
