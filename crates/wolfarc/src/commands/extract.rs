use clap::Args;
use miette::Result;
use std::path::PathBuf;
use tracing::{info, warn};
use wolfarc_dxa::decode_archive;

use super::resolve_key;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory; defaults to a directory named after the archive,
    /// next to it
    #[arg(short, long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Decryption key as text
    #[arg(short, long, value_name = "KEY")]
    key: Option<String>,

    /// Decryption key as hexadecimal byte pairs
    #[arg(long, value_name = "HEX")]
    hex_key: Option<String>,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let key = resolve_key(&self.key, &self.hex_key)?;

        let report = decode_archive(&self.file, self.directory.as_deref(), key.as_deref())?;

        for (path, error) in &report.failures {
            warn!("failed to extract {}: {error}", path.display());
        }
        info!(
            "extracted {} entries from {} ({} failed)",
            report.extracted,
            self.file.display(),
            report.failures.len()
        );
        Ok(())
    }
}
