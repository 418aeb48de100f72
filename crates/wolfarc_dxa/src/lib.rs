//! This library handles reading from and creating **DXA** archives used by the *Wolf RPG Editor*.
//!
//! # DXA Archive Format Documentation
//!
//! This crate provides utilities to pack and extract the **DXA** container
//! format that the Wolf RPG Editor and DX Library based games store their
//! assets in. Archives are typically seen with the `.wolf` or `.dxa`
//! extension and exist in several on-disk versions; v5, v6 and v8 (classic
//! and ChaCha encrypted) are supported here, selected by the header.
//!
//! ## File Structure
//!
//! An archive is a fixed header, followed by the payload region (one blob
//! per file, compressed and encrypted in place), followed by the encrypted
//! and compressed directory block describing the tree.
//!
//! ### Header (v5, 32 bytes)
//!
//! | Offset | Field              | Description                                          |
//! |--------|--------------------|------------------------------------------------------|
//! | 0x00   | Magic number       | 2 bytes: "DX"                                        |
//! | 0x02   | Version            | 2 bytes: 5                                           |
//! | 0x04   | Header size        | 4 bytes: on-disk size of the directory block         |
//! | 0x08   | Data start         | 4 bytes: offset of the first payload byte            |
//! | 0x0C   | Directory offset   | 4 bytes: absolute offset of the directory block      |
//! | 0x10   | File table offset  | 4 bytes: file table start inside the block           |
//! | 0x14   | Dir table offset   | 4 bytes: directory table start inside the block      |
//! | 0x18   | Code flags         | 4 bytes: bit 0 = no encryption                       |
//! | 0x1C   | Huffman threshold  | 1 byte + 3 reserved bytes                            |
//!
//! ### Header (v6 and v8, 64 bytes)
//!
//! The same field order with 64-bit offsets: data start at 0x08, directory
//! offset at 0x10, file table offset at 0x18, directory table offset at
//! 0x20, code flags at 0x28 (bit 1 selects the ChaCha cipher on v8), the
//! Huffman threshold byte at 0x2C and 19 reserved bytes.
//!
//! ### Directory block
//!
//! After decryption and LZSS decompression the block holds the filename
//! table, the file table and the directory table. Filenames are interned,
//! 4-aligned records of a section length followed by an uppercase lookup
//! form and the display form, both NUL terminated. File records carry
//! attributes, Windows-epoch timestamps, the payload offset and the three
//! size fields (stored, original, compressed, plus the entropy-tail length
//! on v8). Directory records are emitted in pre-order with contiguous child
//! ranges in the file table.
//!
//! ### Payloads
//!
//! Each payload is optionally LZSS compressed (skipped when it would grow,
//! recorded as a compressed size of -1), optionally entropy-coded over its
//! final kilobytes on v8, then XORed against the version's keystream cipher
//! at its payload offset.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.wolf`, `.dxa`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Ciphers**: classic 12-byte keystream (v5-v7, v8 classic),
//!   ChaCha20 (v8 with the ChaCha flag)
//!

pub mod bitio;
pub mod cipher;
pub mod directory;
pub mod error;
pub mod huffman;
pub mod lzss;
pub mod profile;
pub mod read;
pub mod types;
pub mod write;

pub use error::{Error, Result};
pub use profile::VersionProfile;
pub use read::{decode_archive, guess_legacy_key, DxaArchive, DxaEntry, ExtractReport};
pub use write::{default_huffman_extensions, encode_directory, DxaWriter, DxaWriterOptions};
