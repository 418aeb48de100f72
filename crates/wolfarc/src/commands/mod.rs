pub mod extract;
pub mod guess_key;
pub mod pack;

use miette::{miette, Result};

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Extract a DXA/WOLF archive into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into a DXA/WOLF archive
    Pack(pack::PackArgs),
    /// Guess the 12-byte key of a legacy archive
    GuessKey(guess_key::GuessKeyArgs),
}

impl Commands {
    pub fn handle(&self) -> Result<()> {
        match self {
            Commands::Extract(extract) => extract.handle(),
            Commands::Pack(pack) => pack.handle(),
            Commands::GuessKey(guess) => guess.handle(),
        }
    }
}

/// Turn a `-k` style hex string into key bytes.
pub fn parse_hex_key(text: &str) -> Result<Vec<u8>> {
    if text.is_empty() || text.len() % 2 != 0 || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(miette!("hex keys must be an even number of hex digits"));
    }
    Ok(text
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = (pair[0] as char).to_digit(16).unwrap_or(0);
            let low = (pair[1] as char).to_digit(16).unwrap_or(0);
            (high << 4 | low) as u8
        })
        .collect())
}

/// Resolve the `--key`/`--hex-key` pair into key material.
pub fn resolve_key(key: &Option<String>, hex_key: &Option<String>) -> Result<Option<Vec<u8>>> {
    match (key, hex_key) {
        (Some(_), Some(_)) => Err(miette!("--key and --hex-key are mutually exclusive")),
        (Some(text), None) => Ok(Some(text.as_bytes().to_vec())),
        (None, Some(hex)) => Ok(Some(parse_hex_key(hex)?)),
        (None, None) => Ok(None),
    }
}
