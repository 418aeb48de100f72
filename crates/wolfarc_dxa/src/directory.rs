//! Building and parsing the directory block.
//!
//! The decompressed block holds three regions: the filename table, the file
//! table and the directory table, in that order. The header records where the
//! two tables start relative to the block. Directory records are emitted in
//! pre-order from the root, and each directory's children occupy a contiguous
//! range of the file table, so extraction can stream the tables front to
//! back. Directories appear in the file table too, carrying the directory
//! attribute and the index of their own directory record in `data_offset`.
//!
//! Filename table entries are 4-aligned: a `u32` section length, then the
//! uppercase lookup form and the display form, each NUL terminated and zero
//! padded to the section length. Names are interned, so a name reused across
//! directories is stored once.
//!
//! The parser works over the immutable block buffer and bounds-checks every
//! offset before use; records hold indices, never positions into the buffer.

use std::collections::BTreeMap;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::profile::{FieldWidth, VersionProfile};
use crate::types::{ArchiveHeader, EntryMetadata, ATTRIB_DIRECTORY};

/// One file table record, widths already normalized to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord {
    pub name_offset: u64,
    pub attributes: u32,
    pub create_time: u64,
    pub access_time: u64,
    pub write_time: u64,
    /// Directory table index of the parent; negative means the root.
    pub parent_dir: i64,
    /// Payload position relative to the data region, or the directory table
    /// index when this record describes a directory.
    pub data_offset: u64,
    pub stored_size: u64,
    pub original_size: u64,
    /// LZSS-compressed length, or -1 when stored verbatim.
    pub compressed_size: i64,
    /// Entropy-coded tail length, or -1 when the tail pass was not applied.
    pub huffman_size: i64,
}

impl FileRecord {
    pub fn is_directory(&self) -> bool {
        self.attributes & ATTRIB_DIRECTORY != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed_size >= 0
    }

    pub fn has_huffman_tail(&self) -> bool {
        self.huffman_size >= 0
    }

    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            attributes: self.attributes,
            create_time: self.create_time,
            access_time: self.access_time,
            write_time: self.write_time,
        }
    }
}

/// One directory table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirRecord {
    /// File table index of the record describing this directory; negative
    /// for the root, which has no file entry.
    pub dir_file_index: i64,
    /// Directory table index of the parent; negative for the root.
    pub parent_dir: i64,
    pub first_file_index: u64,
    pub file_count: u64,
}

/// The directory block materialized into indexed records.
#[derive(Debug)]
pub struct ParsedDirectory {
    pub files: Vec<FileRecord>,
    pub dirs: Vec<DirRecord>,
    /// Archive-relative path per file record, `/` separated.
    pub file_paths: Vec<String>,
    /// Archive-relative path per directory record; empty for the root.
    pub dir_paths: Vec<String>,
}

/// An entry waiting to be serialized, produced by the writer.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Archive-relative path, `/` separated.
    pub path: String,
    pub metadata: EntryMetadata,
    pub is_dir: bool,
    pub data_offset: u64,
    pub stored_size: u64,
    pub original_size: u64,
    pub compressed_size: i64,
    pub huffman_size: i64,
}

/// Serialized directory block plus the table offsets for the header.
#[derive(Debug)]
pub struct BuiltDirectory {
    pub bytes: Vec<u8>,
    pub file_table_offset: u64,
    pub dir_table_offset: u64,
}

/// Produce the case-folding lookup form of a name: ASCII uppercased, with
/// Shift-JIS lead bytes passing their trail byte through untouched.
pub fn fold_lookup(name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len());
    let mut i = 0;
    while i < name.len() {
        let b = name[i];
        let is_lead = (0x81..=0x9f).contains(&b) || (0xe0..=0xef).contains(&b);
        if is_lead && i + 1 < name.len() {
            out.push(b);
            out.push(name[i + 1]);
            i += 2;
        } else {
            out.push(b.to_ascii_uppercase());
            i += 1;
        }
    }
    out
}

fn check_component(component: &str) -> Result<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\', '\0'])
    {
        return Err(Error::InvalidDirectory("invalid path component"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Building

#[derive(Default)]
struct Node {
    children: BTreeMap<String, Node>,
    /// Index into the pending entry list for files.
    payload: Option<usize>,
    metadata: EntryMetadata,
    is_dir: bool,
}

struct NameTable {
    bytes: Vec<u8>,
    offsets: BTreeMap<String, u64>,
}

impl NameTable {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            offsets: BTreeMap::new(),
        }
    }

    fn intern(&mut self, name: &str) -> u64 {
        if let Some(&offset) = self.offsets.get(name) {
            return offset;
        }
        let offset = self.bytes.len() as u64;
        let section = (name.len() + 1).div_ceil(4) * 4;
        self.bytes
            .extend_from_slice(&(section as u32).to_le_bytes());
        let lookup = fold_lookup(name.as_bytes());
        self.bytes.extend_from_slice(&lookup);
        self.bytes.resize(offset as usize + 4 + section, 0);
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.resize(offset as usize + 4 + 2 * section, 0);
        self.offsets.insert(name.to_string(), offset);
        offset
    }
}

struct Emitter<'a> {
    entries: &'a [PendingEntry],
    names: NameTable,
    files: Vec<FileRecord>,
    dirs: Vec<DirRecord>,
}

impl Emitter<'_> {
    fn emit_dir(&mut self, node: &Node, dir_index: usize) -> Result<()> {
        let first = self.files.len();
        for (name, child) in &node.children {
            let name_offset = self.names.intern(name);
            let record = if child.is_dir {
                FileRecord {
                    name_offset,
                    attributes: child.metadata.attributes | ATTRIB_DIRECTORY,
                    create_time: child.metadata.create_time,
                    access_time: child.metadata.access_time,
                    write_time: child.metadata.write_time,
                    parent_dir: dir_index as i64,
                    // Patched to the directory table index below.
                    data_offset: 0,
                    stored_size: 0,
                    original_size: 0,
                    compressed_size: -1,
                    huffman_size: -1,
                }
            } else {
                let entry = &self.entries[child
                    .payload
                    .expect("file nodes always carry their pending entry")];
                FileRecord {
                    name_offset,
                    attributes: entry.metadata.attributes & !ATTRIB_DIRECTORY,
                    create_time: entry.metadata.create_time,
                    access_time: entry.metadata.access_time,
                    write_time: entry.metadata.write_time,
                    parent_dir: dir_index as i64,
                    data_offset: entry.data_offset,
                    stored_size: entry.stored_size,
                    original_size: entry.original_size,
                    compressed_size: entry.compressed_size,
                    huffman_size: entry.huffman_size,
                }
            };
            self.files.push(record);
        }
        self.dirs[dir_index].first_file_index = first as u64;
        self.dirs[dir_index].file_count = (self.files.len() - first) as u64;

        for (i, child) in node.children.values().enumerate() {
            if child.is_dir {
                let file_index = first + i;
                let child_index = self.dirs.len();
                self.files[file_index].data_offset = child_index as u64;
                self.dirs.push(DirRecord {
                    dir_file_index: file_index as i64,
                    parent_dir: dir_index as i64,
                    first_file_index: 0,
                    file_count: 0,
                });
                self.emit_dir(child, child_index)?;
            }
        }
        Ok(())
    }
}

/// Build the serialized directory block from the writer's entry list.
pub fn build(entries: &[PendingEntry], profile: VersionProfile) -> Result<BuiltDirectory> {
    let mut root = Node {
        is_dir: true,
        ..Node::default()
    };
    for (index, entry) in entries.iter().enumerate() {
        let mut node = &mut root;
        let mut components = entry.path.split('/').peekable();
        while let Some(component) = components.next() {
            check_component(component)?;
            let last = components.peek().is_none();
            node = node.children.entry(component.to_string()).or_default();
            if last {
                if entry.is_dir {
                    if node.payload.is_some() {
                        return Err(Error::InvalidDirectory("duplicate entry path"));
                    }
                    node.is_dir = true;
                    node.metadata = entry.metadata;
                } else {
                    if node.is_dir || node.payload.is_some() {
                        return Err(Error::InvalidDirectory("duplicate entry path"));
                    }
                    node.payload = Some(index);
                }
            } else {
                if node.payload.is_some() {
                    return Err(Error::InvalidDirectory("path passes through a file entry"));
                }
                // Intermediate directories may be created implicitly and
                // described by a later add_directory call.
                node.is_dir = true;
            }
        }
    }

    let mut emitter = Emitter {
        entries,
        names: NameTable::new(),
        files: Vec::new(),
        dirs: vec![DirRecord {
            dir_file_index: -1,
            parent_dir: -1,
            first_file_index: 0,
            file_count: 0,
        }],
    };
    emitter.emit_dir(&root, 0)?;

    let mut bytes = emitter.names.bytes;
    let file_table_offset = bytes.len() as u64;
    for record in &emitter.files {
        write_file_record(&mut bytes, record, profile)?;
    }
    let dir_table_offset = bytes.len() as u64;
    for record in &emitter.dirs {
        write_dir_record(&mut bytes, record, profile)?;
    }

    Ok(BuiltDirectory {
        bytes,
        file_table_offset,
        dir_table_offset,
    })
}

fn write_offset(out: &mut Vec<u8>, width: FieldWidth, value: u64) -> Result<()> {
    match width {
        FieldWidth::Narrow => {
            let narrow = u32::try_from(value)
                .map_err(|_| Error::InvalidDirectory("value exceeds the 32-bit field width"))?;
            out.write_u32::<LittleEndian>(narrow)?;
        }
        FieldWidth::Wide => out.write_u64::<LittleEndian>(value)?,
    }
    Ok(())
}

fn write_signed(out: &mut Vec<u8>, width: FieldWidth, value: i64) -> Result<()> {
    match width {
        FieldWidth::Narrow => {
            let narrow = i32::try_from(value)
                .map_err(|_| Error::InvalidDirectory("value exceeds the 32-bit field width"))?;
            out.write_i32::<LittleEndian>(narrow)?;
        }
        FieldWidth::Wide => out.write_i64::<LittleEndian>(value)?,
    }
    Ok(())
}

fn write_file_record(out: &mut Vec<u8>, record: &FileRecord, profile: VersionProfile) -> Result<()> {
    let width = profile.width();
    write_offset(out, width, record.name_offset)?;
    out.write_u32::<LittleEndian>(record.attributes)?;
    out.write_u64::<LittleEndian>(record.create_time)?;
    out.write_u64::<LittleEndian>(record.access_time)?;
    out.write_u64::<LittleEndian>(record.write_time)?;
    write_signed(out, width, record.parent_dir)?;
    write_offset(out, width, record.data_offset)?;
    write_offset(out, width, record.stored_size)?;
    write_offset(out, width, record.original_size)?;
    write_signed(out, width, record.compressed_size)?;
    if profile.has_huffman_sizes() {
        write_signed(out, width, record.huffman_size)?;
    }
    Ok(())
}

fn write_dir_record(out: &mut Vec<u8>, record: &DirRecord, profile: VersionProfile) -> Result<()> {
    let width = profile.width();
    write_signed(out, width, record.dir_file_index)?;
    write_signed(out, width, record.parent_dir)?;
    write_offset(out, width, record.first_file_index)?;
    write_offset(out, width, record.file_count)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing

fn read_offset(input: &mut &[u8], width: FieldWidth) -> Result<u64> {
    Ok(match width {
        FieldWidth::Narrow => u64::from(input.read_u32::<LittleEndian>()?),
        FieldWidth::Wide => input.read_u64::<LittleEndian>()?,
    })
}

fn read_signed(input: &mut &[u8], width: FieldWidth) -> Result<i64> {
    Ok(match width {
        FieldWidth::Narrow => i64::from(input.read_i32::<LittleEndian>()?),
        FieldWidth::Wide => input.read_i64::<LittleEndian>()?,
    })
}

fn read_name(table: &[u8], offset: u64) -> Result<String> {
    let offset = usize::try_from(offset)
        .map_err(|_| Error::InvalidDirectory("name offset out of range"))?;
    if offset % 4 != 0 || offset + 4 > table.len() {
        return Err(Error::InvalidDirectory("name offset out of range"));
    }
    let section = u32::from_le_bytes([
        table[offset],
        table[offset + 1],
        table[offset + 2],
        table[offset + 3],
    ]) as usize;
    if section == 0 || section % 4 != 0 || offset + 4 + 2 * section > table.len() {
        return Err(Error::InvalidDirectory("name section out of range"));
    }
    let display = &table[offset + 4 + section..offset + 4 + 2 * section];
    let end = display
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::InvalidDirectory("name is not NUL terminated"))?;
    let name = String::from_utf8_lossy(&display[..end]).into_owned();
    check_component(&name)?;
    Ok(name)
}

/// Parse a decompressed directory block into indexed records.
pub fn parse(
    block: &[u8],
    header: &ArchiveHeader,
    profile: VersionProfile,
) -> Result<ParsedDirectory> {
    let file_table = usize::try_from(header.file_table_offset)
        .map_err(|_| Error::InvalidDirectory("file table offset out of range"))?;
    let dir_table = usize::try_from(header.dir_table_offset)
        .map_err(|_| Error::InvalidDirectory("directory table offset out of range"))?;
    if file_table > dir_table || dir_table > block.len() {
        return Err(Error::InvalidDirectory("table offsets out of range"));
    }

    let file_entry_len = profile.file_entry_len() as usize;
    let dir_entry_len = profile.dir_entry_len() as usize;
    let file_region = &block[file_table..dir_table];
    let dir_region = &block[dir_table..];
    if file_region.len() % file_entry_len != 0 {
        return Err(Error::InvalidDirectory("file table size is not a record multiple"));
    }
    if dir_region.len() % dir_entry_len != 0 || dir_region.is_empty() {
        return Err(Error::InvalidDirectory("directory table size is not a record multiple"));
    }

    let width = profile.width();
    let mut files = Vec::with_capacity(file_region.len() / file_entry_len);
    let mut cursor = file_region;
    while !cursor.is_empty() {
        let name_offset = read_offset(&mut cursor, width)?;
        let attributes = cursor.read_u32::<LittleEndian>()?;
        let create_time = cursor.read_u64::<LittleEndian>()?;
        let access_time = cursor.read_u64::<LittleEndian>()?;
        let write_time = cursor.read_u64::<LittleEndian>()?;
        let parent_dir = read_signed(&mut cursor, width)?;
        let data_offset = read_offset(&mut cursor, width)?;
        let stored_size = read_offset(&mut cursor, width)?;
        let original_size = read_offset(&mut cursor, width)?;
        let compressed_size = read_signed(&mut cursor, width)?;
        let huffman_size = if profile.has_huffman_sizes() {
            read_signed(&mut cursor, width)?
        } else {
            -1
        };
        files.push(FileRecord {
            name_offset,
            attributes,
            create_time,
            access_time,
            write_time,
            parent_dir,
            data_offset,
            stored_size,
            original_size,
            compressed_size,
            huffman_size,
        });
    }

    let mut dirs = Vec::with_capacity(dir_region.len() / dir_entry_len);
    let mut cursor = dir_region;
    while !cursor.is_empty() {
        dirs.push(DirRecord {
            dir_file_index: read_signed(&mut cursor, width)?,
            parent_dir: read_signed(&mut cursor, width)?,
            first_file_index: read_offset(&mut cursor, width)?,
            file_count: read_offset(&mut cursor, width)?,
        });
    }

    let root = dirs[0];
    if root.dir_file_index >= 0 || root.parent_dir >= 0 {
        return Err(Error::InvalidDirectory("directory table does not start at the root"));
    }
    for (index, dir) in dirs.iter().enumerate().skip(1) {
        // Pre-order: a parent always precedes its children, which also rules
        // out cycles.
        if dir.parent_dir < 0 || dir.parent_dir as usize >= index {
            return Err(Error::InvalidDirectory("directory parent out of order"));
        }
        let file_index = usize::try_from(dir.dir_file_index)
            .map_err(|_| Error::InvalidDirectory("directory file index out of range"))?;
        if file_index >= files.len() || !files[file_index].is_directory() {
            return Err(Error::InvalidDirectory("directory file index out of range"));
        }
    }
    for dir in &dirs {
        let end = dir
            .first_file_index
            .checked_add(dir.file_count)
            .ok_or(Error::InvalidDirectory("child range overflow"))?;
        if end > files.len() as u64 {
            return Err(Error::InvalidDirectory("child range out of range"));
        }
    }

    let name_table = &block[..file_table];
    let mut names = Vec::with_capacity(files.len());
    for file in &files {
        if file.parent_dir >= dirs.len() as i64 {
            return Err(Error::InvalidDirectory("file parent out of range"));
        }
        if file.is_directory() && file.data_offset >= dirs.len() as u64 {
            return Err(Error::InvalidDirectory("directory index out of range"));
        }
        if file.has_huffman_tail() && file.huffman_size as u64 > file.stored_size {
            return Err(Error::InvalidDirectory("entropy tail longer than the stored data"));
        }
        if file.is_compressed() && file.compressed_size as u64 > file.original_size + 64 {
            return Err(Error::InvalidDirectory("compressed size exceeds the original"));
        }
        names.push(read_name(name_table, file.name_offset)?);
    }

    let mut dir_paths = vec![String::new(); dirs.len()];
    for (index, dir) in dirs.iter().enumerate().skip(1) {
        let name = &names[dir.dir_file_index as usize];
        let parent = &dir_paths[dir.parent_dir as usize];
        dir_paths[index] = if parent.is_empty() {
            name.clone()
        } else {
            format!("{parent}/{name}")
        };
    }

    let mut file_paths = Vec::with_capacity(files.len());
    for (file, name) in files.iter().zip(&names) {
        let parent = if file.parent_dir < 0 {
            ""
        } else {
            dir_paths[file.parent_dir as usize].as_str()
        };
        file_paths.push(if parent.is_empty() {
            name.clone()
        } else {
            format!("{parent}/{name}")
        });
    }

    Ok(ParsedDirectory {
        files,
        dirs,
        file_paths,
        dir_paths,
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{build, fold_lookup, parse, PendingEntry};
    use crate::error::Error;
    use crate::profile::VersionProfile;
    use crate::types::{ArchiveHeader, EntryMetadata, ATTRIB_DIRECTORY};

    fn file(path: &str, data_offset: u64, size: u64) -> PendingEntry {
        PendingEntry {
            path: path.to_string(),
            metadata: EntryMetadata::default(),
            is_dir: false,
            data_offset,
            stored_size: size,
            original_size: size,
            compressed_size: -1,
            huffman_size: -1,
        }
    }

    fn dir(path: &str) -> PendingEntry {
        PendingEntry {
            path: path.to_string(),
            metadata: EntryMetadata::directory(),
            is_dir: true,
            data_offset: 0,
            stored_size: 0,
            original_size: 0,
            compressed_size: -1,
            huffman_size: -1,
        }
    }

    fn header_for(built: &super::BuiltDirectory, version: u16) -> ArchiveHeader {
        ArchiveHeader {
            version,
            header_size: 0,
            data_start: 0,
            directory_offset: 0,
            file_table_offset: built.file_table_offset,
            dir_table_offset: built.dir_table_offset,
            code_flags: 0,
            huffman_threshold: 0,
        }
    }

    #[test]
    fn fold_uppercases_ascii_only() {
        assert_eq!(fold_lookup(b"readme.txt"), b"README.TXT");
        // A Shift-JIS lead byte protects its trail byte, here a lowercase 'a'.
        assert_eq!(fold_lookup(&[0x83, b'a', b'z']), vec![0x83, b'a', b'Z']);
    }

    #[test]
    fn empty_tree_serializes_to_a_lone_root() {
        let built = build(&[], VersionProfile::V6).unwrap();
        assert_eq!(built.file_table_offset, 0);

        let parsed = parse(&built.bytes, &header_for(&built, 6), VersionProfile::V6).unwrap();
        assert_eq!(parsed.files.len(), 0);
        assert_eq!(parsed.dirs.len(), 1);
        assert_eq!(parsed.dirs[0].dir_file_index, -1);
        assert_eq!(parsed.dirs[0].parent_dir, -1);
    }

    #[test]
    fn tree_roundtrips_through_the_block() {
        let entries = vec![
            file("a.txt", 0, 6),
            dir("sub"),
            file("sub/b.txt", 6, 6),
            file("sub/deeper/c.txt", 12, 3),
        ];
        for profile in [
            VersionProfile::V5,
            VersionProfile::V6,
            VersionProfile::V8Classic,
        ] {
            let built = build(&entries, profile).unwrap();
            let header = header_for(&built, profile.version_number());
            let parsed = parse(&built.bytes, &header, profile).unwrap();

            // a.txt, sub, sub/b.txt, sub/deeper, sub/deeper/c.txt
            assert_eq!(parsed.files.len(), 5);
            assert_eq!(parsed.dirs.len(), 3);

            let mut paths: Vec<&str> = parsed
                .files
                .iter()
                .zip(&parsed.file_paths)
                .filter(|(f, _)| !f.is_directory())
                .map(|(_, p)| p.as_str())
                .collect();
            paths.sort();
            assert_eq!(paths, vec!["a.txt", "sub/b.txt", "sub/deeper/c.txt"]);

            assert_eq!(parsed.dir_paths, vec!["", "sub", "sub/deeper"]);

            let c = parsed
                .file_paths
                .iter()
                .position(|p| p == "sub/deeper/c.txt")
                .unwrap();
            assert_eq!(parsed.files[c].data_offset, 12);
            assert_eq!(parsed.files[c].stored_size, 3);
        }
    }

    #[test]
    fn children_ranges_are_contiguous_and_preordered() {
        let entries = vec![
            file("zz.txt", 0, 1),
            file("aa/one.txt", 1, 1),
            file("aa/two.txt", 2, 1),
            file("mm/inner/x.txt", 3, 1),
        ];
        let built = build(&entries, VersionProfile::V6).unwrap();
        let header = header_for(&built, 6);
        let parsed = parse(&built.bytes, &header, VersionProfile::V6).unwrap();

        // Pre-order directory emission: root, aa, mm, mm/inner.
        assert_eq!(parsed.dir_paths, vec!["", "aa", "mm", "mm/inner"]);
        for (index, dir) in parsed.dirs.iter().enumerate() {
            let first = dir.first_file_index as usize;
            let count = dir.file_count as usize;
            for file in &parsed.files[first..first + count] {
                assert_eq!(file.parent_dir, index as i64);
            }
        }
        // Root children are sorted by name: aa, mm, zz.txt.
        let root = parsed.dirs[0];
        let names: Vec<&str> = (root.first_file_index..root.first_file_index + root.file_count)
            .map(|i| parsed.file_paths[i as usize].as_str())
            .collect();
        assert_eq!(names, vec!["aa", "mm", "zz.txt"]);
    }

    #[test]
    fn interned_names_are_shared() {
        let entries = vec![file("a/data.bin", 0, 1), file("b/data.bin", 1, 1)];
        let built = build(&entries, VersionProfile::V6).unwrap();
        let header = header_for(&built, 6);
        let parsed = parse(&built.bytes, &header, VersionProfile::V6).unwrap();

        let offsets: Vec<u64> = parsed
            .files
            .iter()
            .zip(&parsed.file_paths)
            .filter(|(_, p)| p.ends_with("data.bin"))
            .map(|(f, _)| f.name_offset)
            .collect();
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[0], offsets[1]);
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let entries = vec![file("a.txt", 0, 1), file("a.txt", 1, 1)];
        assert!(matches!(
            build(&entries, VersionProfile::V6),
            Err(Error::InvalidDirectory(_))
        ));
    }

    #[test]
    fn traversal_components_are_rejected() {
        let entries = vec![file("../escape.txt", 0, 1)];
        assert!(matches!(
            build(&entries, VersionProfile::V6),
            Err(Error::InvalidDirectory(_))
        ));
    }

    #[test]
    fn narrow_fields_reject_oversized_values() {
        let entries = vec![file("big.bin", u64::from(u32::MAX) + 1, 1)];
        assert!(matches!(
            build(&entries, VersionProfile::V5),
            Err(Error::InvalidDirectory(_))
        ));
    }

    #[test]
    fn corrupt_name_offset_is_rejected() {
        let entries = vec![file("a.txt", 0, 1)];
        let built = build(&entries, VersionProfile::V6).unwrap();
        let mut header = header_for(&built, 6);
        // Shrink the name table to push the offset out of range.
        header.file_table_offset = 0;
        header.dir_table_offset -= built.file_table_offset;
        let block = &built.bytes[built.file_table_offset as usize..];
        assert!(matches!(
            parse(block, &header, VersionProfile::V6),
            Err(Error::InvalidDirectory(_))
        ));
    }

    #[test]
    fn misaligned_tables_are_rejected() {
        let entries = vec![file("a.txt", 0, 1)];
        let built = build(&entries, VersionProfile::V6).unwrap();
        let mut header = header_for(&built, 6);
        header.dir_table_offset += 4;
        assert!(matches!(
            parse(&built.bytes, &header, VersionProfile::V6),
            Err(Error::InvalidDirectory(_))
        ));
    }
}
