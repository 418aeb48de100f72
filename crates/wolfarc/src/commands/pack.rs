use clap::Args;
use miette::{miette, Result};
use std::path::PathBuf;
use tracing::info;
use wolfarc_dxa::{encode_directory, DxaWriterOptions, VersionProfile};

use super::resolve_key;

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum VersionArg {
    /// 32-bit layout, classic cipher
    V5,
    /// 64-bit layout, classic cipher
    V6,
    /// 64-bit layout, entropy tail, classic cipher
    V8,
    /// 64-bit layout, entropy tail, ChaCha cipher
    V8Chacha,
}

impl From<VersionArg> for VersionProfile {
    fn from(arg: VersionArg) -> Self {
        match arg {
            VersionArg::V5 => VersionProfile::V5,
            VersionArg::V6 => VersionProfile::V6,
            VersionArg::V8 => VersionProfile::V8Classic,
            VersionArg::V8Chacha => VersionProfile::V8ChaCha,
        }
    }
}

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive file; defaults to the directory name with a .wolf
    /// extension
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Archive format version to write
    #[arg(long, value_enum, default_value_t = VersionArg::V8)]
    version: VersionArg,

    /// Store payloads without LZSS compression
    #[arg(long, default_value_t = false)]
    no_compress: bool,

    /// Run every payload through the entropy tail instead of the allow-list
    #[arg(long, default_value_t = false)]
    always_huffman: bool,

    /// Entropy-tail size in KB; 0 disables it, 255 covers whole payloads
    #[arg(long, value_name = "KB", default_value_t = 10)]
    huffman: u8,

    /// Encryption key as text
    #[arg(short, long, value_name = "KEY")]
    key: Option<String>,

    /// Encryption key as hexadecimal byte pairs
    #[arg(long, value_name = "HEX")]
    hex_key: Option<String>,

    /// Write entries without encryption
    #[arg(long, default_value_t = false)]
    no_key: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        let target = match &self.file {
            Some(file) => file.clone(),
            None => self.directory.with_extension("wolf"),
        };
        if !self.overwrite && target.exists() {
            return Err(miette!("{} already exists", target.display()));
        }

        let key = resolve_key(&self.key, &self.hex_key)?;
        let options = DxaWriterOptions::builder()
            .version(VersionProfile::from(self.version))
            .compress(!self.no_compress)
            .always_huffman(self.always_huffman)
            .huffman_threshold(self.huffman)
            .no_key(self.no_key)
            .maybe_key(key)
            .build();

        info!("creating {}", target.display());
        encode_directory(&target, &self.directory, options)?;
        Ok(())
    }
}
