//! Types for writing DXA archives
//!

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::BinWrite;
use bon::Builder;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::cipher::EntryCipher;
use crate::directory::{self, PendingEntry};
use crate::error::{Error, Result};
use crate::huffman;
use crate::lzss;
use crate::profile::{FieldWidth, VersionProfile};
use crate::types::{ArchiveHeader, EntryMetadata, FLAG_CHACHA, FLAG_NO_CIPHER};

/// The stock allow-list for the selective entropy tail, one extension per
/// line in `data/huffman_extensions.txt`. These formats carry their own
/// compression, so they skip the LZSS pass and take the tail coder instead.
pub fn default_huffman_extensions() -> Vec<String> {
    include_str!("../data/huffman_extensions.txt")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Options for how the archive should be written
#[derive(Debug, Clone, Builder)]
pub struct DxaWriterOptions {
    /// The format version profile to write
    #[builder(default = VersionProfile::V8Classic)]
    pub version: VersionProfile,

    /// LZSS-compress payloads; extensions on the allow-list are exempt
    /// unless `always_huffman` is set
    #[builder(default = true)]
    pub compress: bool,

    /// Run every payload through both passes instead of consulting the
    /// extension allow-list
    #[builder(default = false)]
    pub always_huffman: bool,

    /// Entropy-tail size in whole KiB; 0 disables the pass and 255 covers
    /// the entire payload
    #[builder(default = 10)]
    pub huffman_threshold: u8,

    /// Encryption key material; absent means the version's stock key
    pub key: Option<Vec<u8>>,

    /// Write entries without any encryption
    #[builder(default = false)]
    pub no_key: bool,

    /// Extensions that take the entropy tail in selective mode
    #[builder(default = default_huffman_extensions())]
    pub huffman_extensions: Vec<String>,
}

/// DXA archive generator
///
/// Entries stream through compression and encryption as they are added; the
/// directory block and the final header are written by [`DxaWriter::finish`].
///
/// ```
/// # fn doit() -> wolfarc_dxa::error::Result<()>
/// # {
/// use wolfarc_dxa::{DxaWriter, DxaWriterOptions, VersionProfile};
/// use wolfarc_dxa::types::EntryMetadata;
///
/// // We use a buffer here, though you'd normally use a `File`
/// let mut dxa = DxaWriter::new(
///     std::io::Cursor::new(Vec::new()),
///     DxaWriterOptions::builder()
///         .version(VersionProfile::V6)
///         .build(),
/// )?;
///
/// dxa.add_file("hello_world.txt", EntryMetadata::default(), b"Hello, World!")?;
/// dxa.finish()?;
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct DxaWriter<W: Write + Seek> {
    inner: W,
    options: DxaWriterOptions,
    cipher: EntryCipher,
    entries: Vec<PendingEntry>,
    /// Running payload position relative to the data region.
    data_offset: u64,
}

impl<W: Write + Seek> DxaWriter<W> {
    /// Initializes the archive with a placeholder header.
    ///
    /// The real header is written by [`DxaWriter::finish`] once the payload
    /// region and the directory block are in place.
    pub fn new(mut inner: W, options: DxaWriterOptions) -> Result<Self> {
        let profile = options.version;
        let cipher = if options.no_key {
            EntryCipher::Plain
        } else {
            match &options.key {
                Some(material) => profile.cipher_for(material),
                None => profile.default_cipher(),
            }
        };
        inner.seek(SeekFrom::Start(0))?;
        inner.write_all(&vec![0u8; profile.header_len() as usize])?;
        Ok(Self {
            inner,
            options,
            cipher,
            entries: Vec::new(),
            data_offset: 0,
        })
    }

    pub fn profile(&self) -> VersionProfile {
        self.options.version
    }

    /// Record a directory entry so its attributes and timestamps survive.
    /// Parents of added files that were never added explicitly are
    /// synthesized with blank metadata.
    #[instrument(skip(self), err)]
    pub fn add_directory(&mut self, path: &str, metadata: EntryMetadata) -> Result<()> {
        self.entries.push(PendingEntry {
            path: normalize_path(path),
            metadata,
            is_dir: true,
            data_offset: 0,
            stored_size: 0,
            original_size: 0,
            compressed_size: -1,
            huffman_size: -1,
        });
        Ok(())
    }

    /// Compress, encrypt and append one payload.
    #[instrument(skip(self, metadata, data), fields(size = data.len()), err)]
    pub fn add_file(&mut self, path: &str, metadata: EntryMetadata, data: &[u8]) -> Result<()> {
        let path = normalize_path(path);
        let (mut stored, compressed_size, huffman_size) = self.pack_payload(&path, data);
        self.cipher.apply_at(&mut stored, self.data_offset);
        self.inner.write_all(&stored)?;
        self.entries.push(PendingEntry {
            path,
            metadata,
            is_dir: false,
            data_offset: self.data_offset,
            stored_size: stored.len() as u64,
            original_size: data.len() as u64,
            compressed_size,
            huffman_size,
        });
        self.data_offset += stored.len() as u64;
        Ok(())
    }

    fn pack_payload(&self, path: &str, data: &[u8]) -> (Vec<u8>, i64, i64) {
        let listed = on_allow_list(path, &self.options.huffman_extensions);

        let mut blob = data.to_vec();
        let mut compressed_size = -1i64;
        let lzss_wanted =
            self.options.compress && !data.is_empty() && (self.options.always_huffman || !listed);
        if lzss_wanted {
            let packed = lzss::compress(data);
            if packed.len() < data.len() {
                compressed_size = packed.len() as i64;
                blob = packed;
            } else {
                debug!("storing {path} verbatim, compression would grow it");
            }
        }

        let mut huffman_size = -1i64;
        let threshold = self.options.huffman_threshold;
        let tail_wanted = self.options.version.has_huffman_sizes()
            && threshold > 0
            && !blob.is_empty()
            && (self.options.always_huffman || listed);
        if tail_wanted {
            let tail_len = if threshold == u8::MAX {
                blob.len()
            } else {
                blob.len().min(usize::from(threshold) * 1024)
            };
            let split = blob.len() - tail_len;
            let coded = huffman::encode(&blob[split..]);
            if coded.len() < tail_len {
                huffman_size = coded.len() as i64;
                blob.truncate(split);
                blob.extend_from_slice(&coded);
            }
        }

        (blob, compressed_size, huffman_size)
    }

    /// Build and append the directory block, then patch the header.
    ///
    /// This will return the writer, but one should normally not append any
    /// data to the end of the file.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        let profile = self.options.version;
        let directory_offset = profile.header_len() + self.data_offset;

        let built = directory::build(&self.entries, profile)?;
        let mut block = lzss::compress(&built.bytes);
        if block.len() > u32::MAX as usize {
            return Err(Error::InvalidDirectory("directory block exceeds the header field"));
        }
        self.cipher.apply_at(&mut block, directory_offset);
        self.inner.write_all(&block)?;

        let mut code_flags = 0;
        if self.cipher.is_plain() {
            code_flags |= FLAG_NO_CIPHER;
        }
        if profile.uses_chacha() {
            code_flags |= FLAG_CHACHA;
        }
        let header = ArchiveHeader {
            version: profile.version_number(),
            header_size: block.len() as u32,
            data_start: profile.header_len(),
            directory_offset,
            file_table_offset: built.file_table_offset,
            dir_table_offset: built.dir_table_offset,
            code_flags,
            huffman_threshold: if profile.has_huffman_sizes() {
                self.options.huffman_threshold
            } else {
                0
            },
        };
        if !header.fits(profile) {
            return Err(Error::InvalidDirectory("archive exceeds the 32-bit header fields"));
        }

        self.inner.seek(SeekFrom::Start(0))?;
        match profile.width() {
            FieldWidth::Narrow => header.to_v5().write(&mut self.inner)?,
            FieldWidth::Wide => header.to_wide().write(&mut self.inner)?,
        }
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Pack a whole source directory into an archive file.
///
/// The tree is walked depth first with children sorted by name, which makes
/// the payload order (and with it the entire output) deterministic for a
/// given tree and option set.
#[instrument(skip(options), err)]
pub fn encode_directory(output: &Path, source: &Path, options: DxaWriterOptions) -> Result<()> {
    let out = File::create(output)?;
    let mut writer = DxaWriter::new(BufWriter::new(out), options)?;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::IOError(io::Error::other(e)))?;
        let name = relative.to_string_lossy().replace('\\', "/");
        let metadata = EntryMetadata::from_fs(&entry.metadata().map_err(io::Error::from)?);

        if entry.file_type().is_dir() {
            writer.add_directory(&name, metadata)?;
        } else if entry.file_type().is_file() {
            let data = std::fs::read(entry.path())?;
            writer.add_file(&name, metadata, &data)?;
        }
    }

    writer.finish()?;
    Ok(())
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

fn on_allow_list(path: &str, extensions: &[String]) -> bool {
    match path.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|candidate| *candidate == ext)
        }
        None => false,
    }
}
