use clap::Args;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;
use wolfarc_dxa::guess_legacy_key;

#[derive(Args)]
pub struct GuessKeyArgs {
    /// A legacy archive file (pre-v8, magic already XORed away)
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl GuessKeyArgs {
    pub fn handle(&self) -> Result<()> {
        info!("guessing key from {}", self.file.display());

        let reader = File::open(&self.file).into_diagnostic()?;
        let key = guess_legacy_key(reader)?;

        let hex: String = key.iter().map(|b| format!("{b:02X}")).collect();
        println!("{hex}");
        Ok(())
    }
}
