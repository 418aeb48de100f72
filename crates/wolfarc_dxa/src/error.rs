//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file does not start with the "DX" magic
    #[error("file is not a DXA archive")]
    NotAnArchive,

    /// header version outside the known profile set
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u16),

    /// compressed data ran out before the declared size was produced
    #[error("compressed stream ended before the declared size was reached")]
    TruncatedStream,

    /// LZSS back-reference before the start of the output
    #[error("back-reference distance {distance} exceeds the {available} bytes decoded so far")]
    InvalidReference {
        /// Distance the token asked to copy from
        distance: u64,
        /// Output bytes available at that point
        available: u64,
    },

    /// malformed prefix-code table in an entropy-coded tail
    #[error("invalid prefix-code table: {0}")]
    InvalidCodeTree(&'static str),

    /// the directory block decrypted into something unparseable
    #[error("directory block failed to decode; wrong key?")]
    BadKey,

    /// the directory block is malformed
    #[error("malformed directory block: {0}")]
    InvalidDirectory(&'static str),

    /// key guessing applies to legacy archives only
    #[error("key guessing is not supported for archives with a plain \"DX\" header")]
    KeyGuessUnsupported,

    /// no entry with the requested name or index
    #[error("no archive entry {0}")]
    EntryNotFound(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
